use bytes::Bytes;

use super::*;

#[test]
fn test_basic_round_trip() -> Result<(), util::Error> {
    // 12-byte header plus 4 payload bytes: 16 bytes on the wire.
    let p = Packet {
        header: Header {
            version: 2,
            payload_type: 111,
            sequence_number: 1000,
            timestamp: 48000,
            ssrc: 0xDEADBEEF,
            ..Default::default()
        },
        payload: Bytes::from_static(&[0xAA, 0xBB, 0xCC, 0xDD]),
    };

    let raw = p.marshal()?;
    assert_eq!(raw.len(), 16);

    let mut buf = raw.clone();
    let parsed = Packet::unmarshal(&mut buf)?;
    assert_eq!(parsed, p);
    Ok(())
}

#[test]
fn test_unmarshal_known_bytes() -> Result<(), util::Error> {
    let raw = Bytes::from_static(&[
        0x90, 0xe0, 0x69, 0x8f, 0xd9, 0xc2, 0x93, 0xda, 0x1c, 0x64, 0x27, 0x82, 0x00, 0x01,
        0x00, 0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0x98, 0x36, 0xbe, 0x88, 0x9e,
    ]);

    let mut buf = raw.clone();
    let p = Packet::unmarshal(&mut buf)?;

    assert_eq!(p.header.version, 2);
    assert!(p.header.extension);
    assert!(p.header.marker);
    assert_eq!(p.header.payload_type, 96);
    assert_eq!(p.header.sequence_number, 27023);
    assert_eq!(p.header.timestamp, 3653407706);
    assert_eq!(p.header.ssrc, 476325762);
    assert_eq!(p.header.extension_profile, 1);
    assert_eq!(&*p.header.extension_payload, &[0xFF, 0xFF, 0xFF, 0xFF]);
    assert_eq!(&*p.payload, &[0x98, 0x36, 0xbe, 0x88, 0x9e]);

    let remarshaled = p.marshal()?;
    assert_eq!(remarshaled, raw);
    Ok(())
}

#[test]
fn test_unmarshal_rejects_wrong_version() {
    // Version 1 in the top two bits.
    let raw = [
        0x40, 0x6F, 0x03, 0xE8, 0x00, 0x00, 0xBB, 0x80, 0xDE, 0xAD, 0xBE, 0xEF,
    ];
    let mut buf = &raw[..];
    assert!(Packet::unmarshal(&mut buf).is_err());
}

#[test]
fn test_unmarshal_rejects_truncated_header() {
    let raw = [0x80u8, 0x6F, 0x03];
    let mut buf = &raw[..];
    assert!(Packet::unmarshal(&mut buf).is_err());
}

#[test]
fn test_padding_is_stripped() -> Result<(), util::Error> {
    let p = Packet {
        header: Header {
            version: 2,
            padding: true,
            payload_type: 96,
            sequence_number: 1,
            timestamp: 2,
            ssrc: 3,
            ..Default::default()
        },
        payload: Bytes::from_static(&[0x01, 0x02, 0x00, 0x02]),
    };

    // Marshal writes the payload verbatim: the last byte names 2 bytes of
    // padding which unmarshal must strip.
    let raw = p.marshal()?;
    let mut buf = raw.clone();
    let parsed = Packet::unmarshal(&mut buf)?;
    assert_eq!(&*parsed.payload, &[0x01, 0x02]);
    Ok(())
}

#[test]
fn test_padding_longer_than_payload_rejected() {
    let raw = [
        0xA0u8, 0x6F, 0x03, 0xE8, 0x00, 0x00, 0xBB, 0x80, 0xDE, 0xAD, 0xBE, 0xEF, 0x09,
    ];
    let mut buf = &raw[..];
    assert!(Packet::unmarshal(&mut buf).is_err());
}

#[test]
fn test_csrc_round_trip() -> Result<(), util::Error> {
    let p = Packet {
        header: Header {
            version: 2,
            payload_type: 96,
            sequence_number: 5,
            timestamp: 10,
            ssrc: 0x1234,
            csrc: vec![0x11111111, 0x22222222],
            ..Default::default()
        },
        payload: Bytes::from_static(&[0xAB]),
    };

    let raw = p.marshal()?;
    // 12 + 2*4 CSRC + 1 payload.
    assert_eq!(raw.len(), 21);

    let mut buf = raw;
    let parsed = Packet::unmarshal(&mut buf)?;
    assert_eq!(parsed, p);
    Ok(())
}

#[test]
fn test_extension_must_be_32bit_words() {
    let p = Packet {
        header: Header {
            version: 2,
            extension: true,
            extension_profile: 0x1234,
            extension_payload: Bytes::from_static(&[0x01, 0x02]),
            ..Default::default()
        },
        payload: Bytes::new(),
    };

    assert!(p.marshal().is_err());
}
