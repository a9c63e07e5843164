use std::fmt;

use stun::attributes::ATTR_REQUESTED_TRANSPORT;
use stun::checks::*;
use stun::message::*;

const REQUESTED_TRANSPORT_SIZE: usize = 4;

/// UDP protocol number for REQUESTED-TRANSPORT.
pub const PROTO_UDP: u8 = 17;

/// RequestedTransport implements the REQUESTED-TRANSPORT attribute, naming
/// the transport protocol the client wants between the relay and peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestedTransport {
    pub protocol: u8,
}

impl Default for RequestedTransport {
    fn default() -> Self {
        RequestedTransport {
            protocol: PROTO_UDP,
        }
    }
}

impl fmt::Display for RequestedTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "protocol: {}", self.protocol)
    }
}

impl Setter for RequestedTransport {
    fn add_to(&self, m: &mut Message) -> Result<(), stun::Error> {
        // Protocol, then 3 bytes RFFU.
        let v = [self.protocol, 0, 0, 0];
        m.add(ATTR_REQUESTED_TRANSPORT, &v);
        Ok(())
    }
}

impl Getter for RequestedTransport {
    fn get_from(&mut self, m: &Message) -> Result<(), stun::Error> {
        let v = m.get(ATTR_REQUESTED_TRANSPORT)?;
        check_size(ATTR_REQUESTED_TRANSPORT, v.len(), REQUESTED_TRANSPORT_SIZE)?;
        self.protocol = v[0];
        Ok(())
    }
}
