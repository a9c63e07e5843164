use std::fmt;

use crate::attributes::*;
use crate::checks::*;
use crate::error::Result;
use crate::message::*;

const MAX_USERNAME_B: usize = 513;
const MAX_REALM_B: usize = 763;
const MAX_SOFTWARE_B: usize = 763;
const MAX_NONCE_B: usize = 763;

/// TextAttribute is a helper for any attribute carrying an opaque text value
/// (USERNAME, REALM, SOFTWARE, NONCE).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TextAttribute {
    pub attr: AttrType,
    pub text: String,
}

impl fmt::Display for TextAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

impl Setter for TextAttribute {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        let max = match self.attr {
            ATTR_USERNAME => MAX_USERNAME_B,
            ATTR_REALM => MAX_REALM_B,
            ATTR_SOFTWARE => MAX_SOFTWARE_B,
            ATTR_NONCE => MAX_NONCE_B,
            _ => usize::MAX,
        };
        let text = self.text.as_bytes();
        check_overflow(self.attr, text.len(), max)?;
        m.add(self.attr, text);
        Ok(())
    }
}

impl TextAttribute {
    pub fn new(attr: AttrType, text: String) -> Self {
        TextAttribute { attr, text }
    }

    pub fn get_from_as(m: &Message, attr: AttrType) -> Result<Self> {
        let v = m.get(attr)?;
        let text = String::from_utf8_lossy(&v).to_string();
        Ok(TextAttribute { attr, text })
    }
}

/// USERNAME attribute (RFC 5389 15.3).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Username(pub String);

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Setter for Username {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        TextAttribute::new(ATTR_USERNAME, self.0.clone()).add_to(m)
    }
}

impl Getter for Username {
    fn get_from(&mut self, m: &Message) -> Result<()> {
        self.0 = TextAttribute::get_from_as(m, ATTR_USERNAME)?.text;
        Ok(())
    }
}

impl Username {
    pub fn new(username: String) -> Self {
        Username(username)
    }
}

/// SOFTWARE attribute (RFC 5389 15.10).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Software(pub String);

impl Setter for Software {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        TextAttribute::new(ATTR_SOFTWARE, self.0.clone()).add_to(m)
    }
}

impl Getter for Software {
    fn get_from(&mut self, m: &Message) -> Result<()> {
        self.0 = TextAttribute::get_from_as(m, ATTR_SOFTWARE)?.text;
        Ok(())
    }
}

/// REALM attribute (RFC 5389 15.7).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Realm(pub String);

impl Setter for Realm {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        TextAttribute::new(ATTR_REALM, self.0.clone()).add_to(m)
    }
}

impl Getter for Realm {
    fn get_from(&mut self, m: &Message) -> Result<()> {
        self.0 = TextAttribute::get_from_as(m, ATTR_REALM)?.text;
        Ok(())
    }
}

/// NONCE attribute (RFC 5389 15.8).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Nonce(pub String);

impl Setter for Nonce {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        TextAttribute::new(ATTR_NONCE, self.0.clone()).add_to(m)
    }
}

impl Getter for Nonce {
    fn get_from(&mut self, m: &Message) -> Result<()> {
        self.0 = TextAttribute::get_from_as(m, ATTR_NONCE)?.text;
        Ok(())
    }
}
