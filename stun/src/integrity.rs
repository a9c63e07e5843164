#[cfg(test)]
mod integrity_test;

use std::fmt;

use md5::{Digest, Md5};
use ring::hmac;

use crate::attributes::*;
use crate::checks::*;
use crate::error::{Error, Result};
use crate::message::*;

// separator for credentials.
pub(crate) const CREDENTIALS_SEP: &str = ":";

pub const MESSAGE_INTEGRITY_SIZE: usize = 20;

fn new_hmac(key: &[u8], message: &[u8]) -> Vec<u8> {
    let mac = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, key);
    hmac::sign(&mac, message).as_ref().to_vec()
}

/// MessageIntegrity implements the MESSAGE-INTEGRITY attribute
/// (RFC 5389 15.4): HMAC-SHA1 over the message up to but not including the
/// integrity attribute, with the header length field adjusted to include it.
#[derive(Default, Clone)]
pub struct MessageIntegrity(pub Vec<u8>);

impl fmt::Display for MessageIntegrity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KEY: 0x{:x?}", self.0)
    }
}

impl MessageIntegrity {
    /// Short-term credential key: the password itself.
    pub fn new_short_term_integrity(password: String) -> Self {
        MessageIntegrity(password.into_bytes())
    }

    /// Long-term credential key: MD5 of username:realm:password.
    pub fn new_long_term_integrity(username: String, realm: String, password: String) -> Self {
        let s = [username, realm, password].join(CREDENTIALS_SEP);
        let mut h = Md5::new();
        h.update(s.as_bytes());
        MessageIntegrity(h.finalize().as_slice().to_vec())
    }

    /// Verifies the MESSAGE-INTEGRITY attribute of `m` against this key.
    ///
    /// Attributes after the integrity attribute (FINGERPRINT) are excluded
    /// from the hash, so the header length is rewound to where it stood when
    /// the sender computed the HMAC.
    pub fn check(&self, m: &mut Message) -> Result<()> {
        let b = m.get(ATTR_MESSAGE_INTEGRITY)?;
        check_size(ATTR_MESSAGE_INTEGRITY, b.len(), MESSAGE_INTEGRITY_SIZE)?;

        let mut after_integrity = false;
        let mut size_reduced = 0usize;
        for a in &m.attributes.0 {
            if after_integrity {
                size_reduced += nearest_padded_value_length(a.length as usize);
                size_reduced += ATTRIBUTE_HEADER_SIZE;
            }
            if a.typ == ATTR_MESSAGE_INTEGRITY {
                after_integrity = true;
            }
        }

        let saved_length = m.length;
        m.length -= size_reduced as u32;
        m.write_length();

        let until =
            MESSAGE_HEADER_SIZE + m.length as usize - (ATTRIBUTE_HEADER_SIZE + MESSAGE_INTEGRITY_SIZE);
        let expected = new_hmac(&self.0, &m.raw[..until]);

        m.length = saved_length;
        m.write_length();

        if expected == b {
            Ok(())
        } else {
            Err(Error::ErrIntegrityMismatch)
        }
    }
}

impl Setter for MessageIntegrity {
    /// Appends a MESSAGE-INTEGRITY attribute computed over the message so
    /// far, with the length field temporarily extended to cover the
    /// attribute itself.
    fn add_to(&self, m: &mut Message) -> Result<()> {
        if m.contains(ATTR_FINGERPRINT) {
            return Err(Error::ErrFingerprintBeforeIntegrity);
        }

        m.length += (MESSAGE_INTEGRITY_SIZE + ATTRIBUTE_HEADER_SIZE) as u32;
        m.write_length();
        let v = new_hmac(&self.0, &m.raw);
        m.length -= (MESSAGE_INTEGRITY_SIZE + ATTRIBUTE_HEADER_SIZE) as u32;
        m.write_length();

        m.add(ATTR_MESSAGE_INTEGRITY, &v);
        Ok(())
    }
}
