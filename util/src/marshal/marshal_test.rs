use bytes::{Buf, BufMut};

use super::*;

#[derive(Debug, PartialEq)]
struct TestPayload {
    value: u32,
}

impl MarshalSize for TestPayload {
    fn marshal_size(&self) -> usize {
        4
    }
}

impl Marshal for TestPayload {
    fn marshal_to(&self, mut buf: &mut [u8]) -> Result<usize> {
        if buf.len() < 4 {
            return Err(Error::ErrBufferTooSmall);
        }
        buf.put_u32(self.value);
        Ok(4)
    }
}

impl Unmarshal for TestPayload {
    fn unmarshal<B>(buf: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        if buf.remaining() < 4 {
            return Err(Error::ErrBufferShort);
        }
        Ok(TestPayload {
            value: buf.get_u32(),
        })
    }
}

#[test]
fn test_marshal_round_trip() -> Result<()> {
    let p = TestPayload { value: 0xDEADBEEF };
    let raw = p.marshal()?;
    assert_eq!(raw.len(), p.marshal_size());

    let mut buf = raw.clone();
    let q = TestPayload::unmarshal(&mut buf)?;
    assert_eq!(p, q);

    Ok(())
}

#[test]
fn test_marshal_buffer_too_small() {
    let p = TestPayload { value: 1 };
    let mut buf = [0u8; 2];
    assert!(p.marshal_to(&mut buf).is_err());
}
