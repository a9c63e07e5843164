use std::net::SocketAddr;
use std::time::Duration;

/// A TURN server the agent may allocate a relay candidate from.
#[derive(Debug, Clone)]
pub struct TurnServer {
    pub addr: SocketAddr,
    pub username: String,
    pub password: String,
}

/// Collects the tunables of an [`super::Agent`].
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Controlling agents schedule nomination; controlled agents wait for
    /// USE-CANDIDATE.
    pub is_controlling: bool,

    /// Local addresses to bind, one socket (and host candidate) each.
    /// Port 0 lets the OS pick.
    pub local_addrs: Vec<SocketAddr>,

    pub stun_servers: Vec<SocketAddr>,
    pub turn_servers: Vec<TurnServer>,

    /// How often `process()` schedules a connectivity check.
    pub check_interval: Duration,
    /// A transaction with no response after this long fails its pair.
    pub check_timeout: Duration,
    /// Overall deadline for the Checking state.
    pub failed_timeout: Duration,
    /// Binding indication cadence on the selected pair.
    pub keepalive_interval: Duration,
    /// Silence on the selected pair longer than this is a disconnect.
    pub disconnected_timeout: Duration,
    /// Response deadline for a STUN server during gathering.
    pub gather_timeout: Duration,

    pub gather_host_candidates: bool,
    pub gather_srflx_candidates: bool,
    pub gather_relay_candidates: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            is_controlling: false,
            local_addrs: vec![SocketAddr::from(([0, 0, 0, 0], 0))],
            stun_servers: vec![],
            turn_servers: vec![],
            check_interval: Duration::from_millis(50),
            check_timeout: Duration::from_secs(2),
            failed_timeout: Duration::from_secs(30),
            keepalive_interval: Duration::from_secs(15),
            disconnected_timeout: Duration::from_secs(5),
            gather_timeout: Duration::from_millis(500),
            gather_host_candidates: true,
            gather_srflx_candidates: true,
            gather_relay_candidates: true,
        }
    }
}
