use std::fmt;

use stun::attributes::ATTR_CHANNEL_NUMBER;
use stun::checks::*;
use stun::message::*;

use crate::error::Error;

/// Channel numbers are allocated from the range [0x4000, 0x7FFE]
/// (RFC 5766 section 11).
pub const MIN_CHANNEL_NUMBER: u16 = 0x4000;
pub const MAX_CHANNEL_NUMBER: u16 = 0x7FFE;

const CHANNEL_NUMBER_SIZE: usize = 4;

/// ChannelNumber represents the CHANNEL-NUMBER attribute.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ChannelNumber(pub u16);

impl fmt::Display for ChannelNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CN 0x{:x}", self.0)
    }
}

impl ChannelNumber {
    /// Returns an error unless the number is within the allowed range.
    pub fn valid(&self) -> Result<(), Error> {
        if self.0 < MIN_CHANNEL_NUMBER || self.0 > MAX_CHANNEL_NUMBER {
            Err(Error::ErrInvalidChannelNumber)
        } else {
            Ok(())
        }
    }
}

impl Setter for ChannelNumber {
    fn add_to(&self, m: &mut Message) -> Result<(), stun::Error> {
        let mut v = [0u8; CHANNEL_NUMBER_SIZE];
        v[..2].copy_from_slice(&self.0.to_be_bytes());
        // The rest of the value is RFFU, zero on send.
        m.add(ATTR_CHANNEL_NUMBER, &v);
        Ok(())
    }
}

impl Getter for ChannelNumber {
    fn get_from(&mut self, m: &Message) -> Result<(), stun::Error> {
        let v = m.get(ATTR_CHANNEL_NUMBER)?;
        check_size(ATTR_CHANNEL_NUMBER, v.len(), CHANNEL_NUMBER_SIZE)?;
        self.0 = u16::from_be_bytes([v[0], v[1]]);
        Ok(())
    }
}
