
use std::fmt;

use rand::Rng;

use crate::attributes::*;
use crate::error::{Error, Result};

/// MAGIC_COOKIE is the fixed value distinguishing STUN packets from other
/// protocols multiplexed on the same port.
///
/// The magic cookie field MUST contain the fixed value 0x2112A442 in
/// network byte order (RFC 5389, section 6).
pub const MAGIC_COOKIE: u32 = 0x2112A442;
pub const ATTRIBUTE_HEADER_SIZE: usize = 4;
pub const MESSAGE_HEADER_SIZE: usize = 20;
pub const TRANSACTION_ID_SIZE: usize = 12; // 96 bit

const DEFAULT_RAW_CAPACITY: usize = 120;

/// Setter appends an attribute (or other state) to a message.
pub trait Setter {
    fn add_to(&self, m: &mut Message) -> Result<()>;
}

/// Getter decodes an attribute from a message.
pub trait Getter {
    fn get_from(&mut self, m: &Message) -> Result<()>;
}

/// Checker validates an attribute already present in a message.
pub trait Checker {
    fn check(&self, m: &Message) -> Result<()>;
}

/// Returns true if `b` looks like a STUN message: long enough, class bits in
/// the first byte zero, and the magic cookie in place. Useful for
/// multiplexing; does not guarantee that decoding will succeed.
pub fn is_message(b: &[u8]) -> bool {
    b.len() >= MESSAGE_HEADER_SIZE
        && b[0] & 0xC0 == 0
        && u32::from_be_bytes([b[4], b[5], b[6], b[7]]) == MAGIC_COOKIE
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TransactionId(pub [u8; TRANSACTION_ID_SIZE]);

impl TransactionId {
    /// Returns a cryptographically random transaction ID.
    pub fn new() -> Self {
        let mut b = TransactionId([0u8; TRANSACTION_ID_SIZE]);
        rand::thread_rng().fill(&mut b.0);
        b
    }
}

impl Setter for TransactionId {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        m.transaction_id = *self;
        m.write_transaction_id();
        Ok(())
    }
}

/// Message is a single STUN packet. The raw wire image is kept alongside the
/// decoded fields so attributes can be appended without re-encoding, and so
/// MESSAGE-INTEGRITY / FINGERPRINT can hash the exact bytes.
#[derive(Default, Debug, Clone)]
pub struct Message {
    pub typ: MessageType,
    pub length: u32, // len(raw) not including header
    pub transaction_id: TransactionId,
    pub attributes: Attributes,
    pub raw: Vec<u8>,
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} l={} attrs={} id={:x?}",
            self.typ,
            self.length,
            self.attributes.0.len(),
            self.transaction_id.0,
        )
    }
}

// Ignores raw when comparing: two messages with the same decoded content are
// equal even if one has not been encoded yet.
impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.typ == other.typ
            && self.length == other.length
            && self.transaction_id == other.transaction_id
            && self.attributes == other.attributes
    }
}

impl Message {
    pub fn new() -> Self {
        Message {
            raw: {
                let mut raw = Vec::with_capacity(DEFAULT_RAW_CAPACITY);
                raw.extend_from_slice(&[0; MESSAGE_HEADER_SIZE]);
                raw
            },
            ..Default::default()
        }
    }

    /// Sets the transaction ID to a fresh random value.
    pub fn new_transaction_id(&mut self) {
        self.transaction_id = TransactionId::new();
        self.write_transaction_id();
    }

    /// Resets message, attributes and underlying buffer length.
    pub fn reset(&mut self) {
        self.raw.clear();
        self.length = 0;
        self.attributes.0.clear();
    }

    fn grow(&mut self, n: usize) {
        if self.raw.len() < n {
            self.raw.resize(n, 0);
        }
    }

    /// Appends a new attribute TLV to the message, padding the value out to a
    /// 4-byte boundary. The value is copied into the internal buffer.
    pub fn add(&mut self, t: AttrType, v: &[u8]) {
        let alloc_size = ATTRIBUTE_HEADER_SIZE + v.len();
        let first = MESSAGE_HEADER_SIZE + self.length as usize;
        let mut last = first + alloc_size;
        self.grow(last);
        self.length += alloc_size as u32;

        let buf = &mut self.raw[first..last];
        buf[0..2].copy_from_slice(&t.value().to_be_bytes());
        buf[2..4].copy_from_slice(&(v.len() as u16).to_be_bytes());
        buf[ATTRIBUTE_HEADER_SIZE..].copy_from_slice(v);

        let attr = RawAttribute {
            typ: t,
            length: v.len() as u16,
            value: v.to_vec(),
        };

        if attr.length as usize % PADDING != 0 {
            let bytes_to_add = nearest_padded_value_length(v.len()) - v.len();
            last += bytes_to_add;
            self.grow(last);
            // Zero the padding so stale buffer contents never leak.
            for b in &mut self.raw[last - bytes_to_add..last] {
                *b = 0;
            }
            self.length += bytes_to_add as u32;
        }

        self.attributes.0.push(attr);
        self.write_length();
    }

    /// Returns a copy of the value of the first attribute of type `t`.
    pub fn get(&self, t: AttrType) -> Result<Vec<u8>> {
        Ok(self.attributes.get(t)?.value.clone())
    }

    pub fn contains(&self, t: AttrType) -> bool {
        self.attributes.contains(t)
    }

    pub fn write_length(&mut self) {
        self.grow(4);
        self.raw[2..4].copy_from_slice(&(self.length as u16).to_be_bytes());
    }

    pub fn write_type(&mut self) {
        self.grow(2);
        self.raw[..2].copy_from_slice(&self.typ.value().to_be_bytes());
    }

    pub fn write_transaction_id(&mut self) {
        self.grow(MESSAGE_HEADER_SIZE);
        self.raw[8..MESSAGE_HEADER_SIZE].copy_from_slice(&self.transaction_id.0);
    }

    pub fn write_header(&mut self) {
        self.grow(MESSAGE_HEADER_SIZE);
        self.write_type();
        self.write_length();
        self.raw[4..8].copy_from_slice(&MAGIC_COOKIE.to_be_bytes());
        self.write_transaction_id();
    }

    pub fn set_type(&mut self, t: MessageType) {
        self.typ = t;
        self.write_type();
    }

    /// Re-encodes the message into `raw` from the decoded fields.
    pub fn encode(&mut self) {
        self.raw.clear();
        self.raw.extend_from_slice(&[0; MESSAGE_HEADER_SIZE]);
        self.length = 0;
        self.write_header();

        let attributes: Vec<RawAttribute> = self.attributes.0.drain(..).collect();
        for a in &attributes {
            self.add(a.typ, &a.value);
        }
    }

    /// Decodes `raw` into the message fields, validating the header and
    /// walking the attribute TLVs.
    pub fn decode(&mut self) -> Result<()> {
        let buf = &self.raw;
        if buf.len() < MESSAGE_HEADER_SIZE {
            return Err(Error::ErrUnexpectedHeaderEof);
        }

        let t = u16::from_be_bytes([buf[0], buf[1]]);
        let size = u16::from_be_bytes([buf[2], buf[3]]) as usize;
        let cookie = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let full_size = MESSAGE_HEADER_SIZE + size;

        if cookie != MAGIC_COOKIE {
            return Err(Error::ErrBadMagicCookie);
        }
        if buf.len() < full_size {
            return Err(Error::ErrUnexpectedEof);
        }

        self.typ.read_value(t);
        self.length = size as u32;
        self.transaction_id
            .0
            .copy_from_slice(&buf[8..MESSAGE_HEADER_SIZE]);

        self.attributes.0.clear();
        let mut offset = 0;
        let mut b = &buf[MESSAGE_HEADER_SIZE..full_size];

        while offset < size {
            if b.len() < ATTRIBUTE_HEADER_SIZE {
                return Err(Error::ErrUnexpectedEof);
            }

            let typ = AttrType(u16::from_be_bytes([b[0], b[1]]));
            let length = u16::from_be_bytes([b[2], b[3]]);
            let a_len = length as usize;
            let a_buf_len = nearest_padded_value_length(a_len);

            b = &b[ATTRIBUTE_HEADER_SIZE..];
            offset += ATTRIBUTE_HEADER_SIZE;
            if b.len() < a_buf_len {
                return Err(Error::ErrUnexpectedEof);
            }

            self.attributes.0.push(RawAttribute {
                typ,
                length,
                value: b[..a_len].to_vec(),
            });
            offset += a_buf_len;
            b = &b[a_buf_len..];
        }

        Ok(())
    }

    /// Copies `t_buf` into `raw` and decodes it.
    pub fn write(&mut self, t_buf: &[u8]) -> Result<usize> {
        self.raw.clear();
        self.raw.extend_from_slice(t_buf);
        self.decode()?;
        Ok(t_buf.len())
    }

    /// Applies every setter in order, writing the header first.
    pub fn build(&mut self, setters: &[Box<dyn Setter>]) -> Result<()> {
        self.reset();
        self.write_header();
        for s in setters {
            s.add_to(self)?;
        }
        Ok(())
    }

    /// Runs every checker against the message.
    pub fn check<C: Checker>(&self, checkers: &[C]) -> Result<()> {
        for c in checkers {
            c.check(self)?;
        }
        Ok(())
    }

    /// Creates a response message carrying over this message's transaction id.
    pub fn build_response(&self, typ: MessageType) -> Message {
        let mut res = Message::new();
        res.set_type(typ);
        res.transaction_id = self.transaction_id;
        res.write_transaction_id();
        res
    }
}

/// MessageClass is the 2-bit STUN class.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MessageClass(pub u8);

pub const CLASS_REQUEST: MessageClass = MessageClass(0x00);
pub const CLASS_INDICATION: MessageClass = MessageClass(0x01);
pub const CLASS_SUCCESS_RESPONSE: MessageClass = MessageClass(0x02);
pub const CLASS_ERROR_RESPONSE: MessageClass = MessageClass(0x03);

impl fmt::Display for MessageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            CLASS_REQUEST => "request",
            CLASS_INDICATION => "indication",
            CLASS_SUCCESS_RESPONSE => "success response",
            CLASS_ERROR_RESPONSE => "error response",
            _ => "unknown class",
        };
        write!(f, "{s}")
    }
}

/// Method is the 12-bit STUN method.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Method(pub u16);

pub const METHOD_BINDING: Method = Method(0x001);
pub const METHOD_ALLOCATE: Method = Method(0x003);
pub const METHOD_REFRESH: Method = Method(0x004);
pub const METHOD_SEND: Method = Method(0x006);
pub const METHOD_DATA: Method = Method(0x007);
pub const METHOD_CREATE_PERMISSION: Method = Method(0x008);
pub const METHOD_CHANNEL_BIND: Method = Method(0x009);

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            METHOD_BINDING => "Binding",
            METHOD_ALLOCATE => "Allocate",
            METHOD_REFRESH => "Refresh",
            METHOD_SEND => "Send",
            METHOD_DATA => "Data",
            METHOD_CREATE_PERMISSION => "CreatePermission",
            METHOD_CHANNEL_BIND => "ChannelBind",
            other => return write!(f, "0x{:x}", other.0),
        };
        write!(f, "{s}")
    }
}

/// MessageType is the method + class packed into the 14-bit type field.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MessageType {
    pub method: Method,
    pub class: MessageClass,
}

pub const BINDING_REQUEST: MessageType = MessageType {
    method: METHOD_BINDING,
    class: CLASS_REQUEST,
};
pub const BINDING_SUCCESS: MessageType = MessageType {
    method: METHOD_BINDING,
    class: CLASS_SUCCESS_RESPONSE,
};
pub const BINDING_ERROR: MessageType = MessageType {
    method: METHOD_BINDING,
    class: CLASS_ERROR_RESPONSE,
};
pub const BINDING_INDICATION: MessageType = MessageType {
    method: METHOD_BINDING,
    class: CLASS_INDICATION,
};

// The method bits are split around the class bits:
//  0b00MMMMMC MMMCMMMM, C1 at bit 8 and C0 at bit 4.
const METHOD_A_BITS: u16 = 0x000F; // M3..M0
const METHOD_B_BITS: u16 = 0x0070; // M6..M4
const METHOD_D_BITS: u16 = 0x0F80; // M11..M7
const METHOD_B_SHIFT: u16 = 1;
const METHOD_D_SHIFT: u16 = 2;
const C0_BIT: u16 = 0x1;
const C1_BIT: u16 = 0x2;
const CLASS_C0_SHIFT: u16 = 4;
const CLASS_C1_SHIFT: u16 = 7;

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.class)
    }
}

impl Setter for MessageType {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        m.set_type(*self);
        Ok(())
    }
}

impl MessageType {
    pub const fn new(method: Method, class: MessageClass) -> Self {
        MessageType { method, class }
    }

    /// Encodes the type to its 14-bit wire value.
    pub fn value(&self) -> u16 {
        let method = self.method.0;
        let a = method & METHOD_A_BITS;
        let b = (method & METHOD_B_BITS) << METHOD_B_SHIFT;
        let d = (method & METHOD_D_BITS) << METHOD_D_SHIFT;

        let class = self.class.0 as u16;
        let c0 = (class & C0_BIT) << CLASS_C0_SHIFT;
        let c1 = (class & C1_BIT) << CLASS_C1_SHIFT;

        a + b + d + c0 + c1
    }

    /// Decodes the type from its wire value.
    pub fn read_value(&mut self, v: u16) {
        let c0 = (v >> CLASS_C0_SHIFT) & C0_BIT;
        let c1 = (v >> CLASS_C1_SHIFT) & C1_BIT;
        self.class = MessageClass((c0 + c1) as u8);

        let a = v & METHOD_A_BITS;
        let b = (v >> METHOD_B_SHIFT) & METHOD_B_BITS;
        let d = (v >> METHOD_D_SHIFT) & METHOD_D_BITS;
        self.method = Method(a + b + d);
    }
}
