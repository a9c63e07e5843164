use std::fmt;

use crate::error::{Error, Result};
use crate::message::{Message, ATTRIBUTE_HEADER_SIZE};

/// AttrType is an attribute type per the IANA STUN registry.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttrType(pub u16);

impl AttrType {
    /// Attributes with a type below 0x8000 are comprehension-required:
    /// a message with an unknown one must be rejected.
    pub fn required(&self) -> bool {
        self.0 <= 0x7FFF
    }

    pub fn optional(&self) -> bool {
        !self.required()
    }

    pub fn value(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for AttrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            ATTR_MAPPED_ADDRESS => "MAPPED-ADDRESS",
            ATTR_USERNAME => "USERNAME",
            ATTR_MESSAGE_INTEGRITY => "MESSAGE-INTEGRITY",
            ATTR_ERROR_CODE => "ERROR-CODE",
            ATTR_UNKNOWN_ATTRIBUTES => "UNKNOWN-ATTRIBUTES",
            ATTR_REALM => "REALM",
            ATTR_NONCE => "NONCE",
            ATTR_XORMAPPED_ADDRESS => "XOR-MAPPED-ADDRESS",
            ATTR_SOFTWARE => "SOFTWARE",
            ATTR_FINGERPRINT => "FINGERPRINT",
            ATTR_PRIORITY => "PRIORITY",
            ATTR_USE_CANDIDATE => "USE-CANDIDATE",
            ATTR_ICE_CONTROLLED => "ICE-CONTROLLED",
            ATTR_ICE_CONTROLLING => "ICE-CONTROLLING",
            ATTR_CHANNEL_NUMBER => "CHANNEL-NUMBER",
            ATTR_LIFETIME => "LIFETIME",
            ATTR_XOR_PEER_ADDRESS => "XOR-PEER-ADDRESS",
            ATTR_DATA => "DATA",
            ATTR_XOR_RELAYED_ADDRESS => "XOR-RELAYED-ADDRESS",
            ATTR_REQUESTED_TRANSPORT => "REQUESTED-TRANSPORT",
            other => return write!(f, "0x{:x}", other.0),
        };
        write!(f, "{s}")
    }
}

// RFC 5389 comprehension-required range.
pub const ATTR_MAPPED_ADDRESS: AttrType = AttrType(0x0001);
pub const ATTR_USERNAME: AttrType = AttrType(0x0006);
pub const ATTR_MESSAGE_INTEGRITY: AttrType = AttrType(0x0008);
pub const ATTR_ERROR_CODE: AttrType = AttrType(0x0009);
pub const ATTR_UNKNOWN_ATTRIBUTES: AttrType = AttrType(0x000A);
pub const ATTR_REALM: AttrType = AttrType(0x0014);
pub const ATTR_NONCE: AttrType = AttrType(0x0015);
pub const ATTR_XORMAPPED_ADDRESS: AttrType = AttrType(0x0020);

// RFC 5389 comprehension-optional range.
pub const ATTR_SOFTWARE: AttrType = AttrType(0x8022);
pub const ATTR_FINGERPRINT: AttrType = AttrType(0x8028);

// RFC 8445 (ICE).
pub const ATTR_PRIORITY: AttrType = AttrType(0x0024);
pub const ATTR_USE_CANDIDATE: AttrType = AttrType(0x0025);
pub const ATTR_ICE_CONTROLLED: AttrType = AttrType(0x8029);
pub const ATTR_ICE_CONTROLLING: AttrType = AttrType(0x802A);

// RFC 5766 (TURN).
pub const ATTR_CHANNEL_NUMBER: AttrType = AttrType(0x000C);
pub const ATTR_LIFETIME: AttrType = AttrType(0x000D);
pub const ATTR_XOR_PEER_ADDRESS: AttrType = AttrType(0x0012);
pub const ATTR_DATA: AttrType = AttrType(0x0013);
pub const ATTR_XOR_RELAYED_ADDRESS: AttrType = AttrType(0x0016);
pub const ATTR_REQUESTED_TRANSPORT: AttrType = AttrType(0x0019);

/// Attribute values are padded out to a 4-byte boundary on the wire.
pub const PADDING: usize = 4;

pub fn nearest_padded_value_length(l: usize) -> usize {
    let mut n = PADDING * (l / PADDING);
    if n < l {
        n += PADDING;
    }
    n
}

/// RawAttribute is a TLV attribute as it sits in the message buffer; `value`
/// excludes padding.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RawAttribute {
    pub typ: AttrType,
    pub length: u16,
    pub value: Vec<u8>,
}

impl fmt::Display for RawAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:x?}", self.typ, self.value)
    }
}

impl crate::message::Setter for RawAttribute {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        m.add(self.typ, &self.value);
        Ok(())
    }
}

/// Attributes is the decoded attribute list of a message.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Attributes(pub Vec<RawAttribute>);

impl Attributes {
    /// Returns the first attribute of type `t`, or `ErrAttributeNotFound`.
    pub fn get(&self, t: AttrType) -> Result<&RawAttribute> {
        self.0
            .iter()
            .find(|a| a.typ == t)
            .ok_or(Error::ErrAttributeNotFound)
    }

    pub fn contains(&self, t: AttrType) -> bool {
        self.0.iter().any(|a| a.typ == t)
    }

    /// Total encoded size of all attributes, headers and padding included.
    pub fn encoded_size(&self) -> usize {
        self.0
            .iter()
            .map(|a| ATTRIBUTE_HEADER_SIZE + nearest_padded_value_length(a.length as usize))
            .sum()
    }
}
