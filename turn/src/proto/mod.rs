pub mod chandata;
pub mod channum;
pub mod data;
pub mod lifetime;
pub mod peeraddr;
pub mod relayaddr;
pub mod reqtrans;


/// Default lifetime of a TURN allocation (RFC 5766 section 2.2).
pub const DEFAULT_LIFETIME_SECS: u32 = 600;
