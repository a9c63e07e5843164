use super::*;

#[test]
fn test_fingerprint_round_trip() -> Result<()> {
    let mut m = Message::new();
    m.set_type(BINDING_REQUEST);
    m.new_transaction_id();
    m.add(crate::attributes::ATTR_SOFTWARE, b"software");
    FINGERPRINT.add_to(&mut m)?;

    let mut received = Message::new();
    received.write(&m.raw)?;
    FINGERPRINT.check(&received)?;
    Ok(())
}

#[test]
fn test_fingerprint_detects_corruption() -> Result<()> {
    let mut m = Message::new();
    m.set_type(BINDING_REQUEST);
    m.new_transaction_id();
    m.add(crate::attributes::ATTR_SOFTWARE, b"software");
    FINGERPRINT.add_to(&mut m)?;

    let mut raw = m.raw.clone();
    let flip = MESSAGE_HEADER_SIZE + 2;
    raw[flip] ^= 0xFF;

    let mut received = Message::new();
    received.write(&raw)?;
    assert_eq!(FINGERPRINT.check(&received), Err(Error::ErrFingerprintMismatch));
    Ok(())
}

#[test]
fn test_fingerprint_value_xor() {
    // The attribute is CRC-32 XOR'ed with 0x5354554E; XOR-ing back out must
    // recover the plain checksum.
    let data = b"0123456789";
    let fp = fingerprint_value(data);
    let crc = crc::Crc::<u32>::new(&crc::CRC_32_ISO_HDLC).checksum(data);
    assert_eq!(fp ^ FINGERPRINT_XOR_VALUE, crc);
}
