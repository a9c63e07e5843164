#[cfg(test)]
mod control_test;

use stun::attributes::{ATTR_ICE_CONTROLLED, ATTR_ICE_CONTROLLING, AttrType};
use stun::checks::*;
use stun::message::*;

/// Common helper for the 64-bit tie-breaker both role attributes carry.
fn add_tie_breaker(m: &mut Message, attr: AttrType, tie_breaker: u64) -> Result<(), stun::Error> {
    m.add(attr, &tie_breaker.to_be_bytes());
    Ok(())
}

fn get_tie_breaker(m: &Message, attr: AttrType) -> Result<u64, stun::Error> {
    let v = m.get(attr)?;
    check_size(attr, v.len(), 8)?;
    Ok(u64::from_be_bytes([
        v[0], v[1], v[2], v[3], v[4], v[5], v[6], v[7],
    ]))
}

/// ICE-CONTROLLING attribute (RFC 8445 7.1.3).
#[derive(Default, Debug, PartialEq, Eq, Clone, Copy)]
pub struct AttrControlling(pub u64);

impl Setter for AttrControlling {
    fn add_to(&self, m: &mut Message) -> Result<(), stun::Error> {
        add_tie_breaker(m, ATTR_ICE_CONTROLLING, self.0)
    }
}

impl Getter for AttrControlling {
    fn get_from(&mut self, m: &Message) -> Result<(), stun::Error> {
        self.0 = get_tie_breaker(m, ATTR_ICE_CONTROLLING)?;
        Ok(())
    }
}

/// ICE-CONTROLLED attribute (RFC 8445 7.1.3).
#[derive(Default, Debug, PartialEq, Eq, Clone, Copy)]
pub struct AttrControlled(pub u64);

impl Setter for AttrControlled {
    fn add_to(&self, m: &mut Message) -> Result<(), stun::Error> {
        add_tie_breaker(m, ATTR_ICE_CONTROLLED, self.0)
    }
}

impl Getter for AttrControlled {
    fn get_from(&mut self, m: &Message) -> Result<(), stun::Error> {
        self.0 = get_tie_breaker(m, ATTR_ICE_CONTROLLED)?;
        Ok(())
    }
}
