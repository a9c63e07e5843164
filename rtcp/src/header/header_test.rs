use bytes::Bytes;

use super::*;

#[test]
fn test_header_round_trip() -> Result<(), util::Error> {
    let h = Header {
        padding: true,
        count: 31,
        packet_type: PacketType::SenderReport,
        length: 4,
    };

    let raw = h.marshal()?;
    let mut buf = raw.clone();
    let parsed = Header::unmarshal(&mut buf)?;
    assert_eq!(parsed, h);
    Ok(())
}

#[test]
fn test_header_unmarshal_known_bytes() -> Result<(), util::Error> {
    // v=2, p=0, count=1, RR, len=7
    let mut data = Bytes::from_static(&[0x81, 0xc9, 0x00, 0x07]);
    let h = Header::unmarshal(&mut data)?;
    assert_eq!(
        h,
        Header {
            padding: false,
            count: 1,
            packet_type: PacketType::ReceiverReport,
            length: 7,
        }
    );
    Ok(())
}

#[test]
fn test_header_rejects_wrong_version() {
    // Version 0 in the top bits.
    let mut data = Bytes::from_static(&[0x00, 0xc9, 0x00, 0x07]);
    assert!(Header::unmarshal(&mut data).is_err());
}

#[test]
fn test_header_count_overflow() {
    let h = Header {
        padding: false,
        count: 40,
        packet_type: PacketType::ReceiverReport,
        length: 0,
    };
    assert!(h.marshal().is_err());
}
