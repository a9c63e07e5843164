use super::*;

#[test]
fn test_remb_round_trip() -> Result<(), util::Error> {
    let remb = ReceiverEstimatedMaximumBitrate {
        sender_ssrc: 1,
        bitrate: 8927168,
        ssrcs: vec![0x215F2E92],
    };

    let raw = remb.marshal()?;
    let mut buf = raw.clone();
    let parsed = ReceiverEstimatedMaximumBitrate::unmarshal(&mut buf)?;
    assert_eq!(parsed, remb);
    Ok(())
}

#[test]
fn test_remb_known_bytes() -> Result<(), util::Error> {
    // fmt=15, PSFB, 'REMB', 1 ssrc, exp/mantissa for 8927168 bps.
    let raw: &[u8] = &[
        0x8F, 0xCE, 0x00, 0x05, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x52, 0x45,
        0x4D, 0x42, 0x01, 0x1A, 0x20, 0xDF, 0x21, 0x5F, 0x2E, 0x92,
    ];

    let mut buf = raw;
    let parsed = ReceiverEstimatedMaximumBitrate::unmarshal(&mut buf)?;

    assert_eq!(parsed.sender_ssrc, 1);
    assert_eq!(parsed.bitrate, 8927168);
    assert_eq!(parsed.ssrcs, vec![0x215F2E92]);

    let remarshaled = parsed.marshal()?;
    assert_eq!(&*remarshaled, raw);
    Ok(())
}

#[test]
fn test_remb_mantissa_truncation() -> Result<(), util::Error> {
    // A bitrate needing more than 18 bits of precision loses its low bits on
    // the wire.
    let remb = ReceiverEstimatedMaximumBitrate {
        sender_ssrc: 1,
        bitrate: 2_000_001,
        ssrcs: vec![],
    };

    let raw = remb.marshal()?;
    let mut buf = raw.clone();
    let parsed = ReceiverEstimatedMaximumBitrate::unmarshal(&mut buf)?;
    assert_eq!(parsed.bitrate, 2_000_000);
    Ok(())
}

#[test]
fn test_remb_nonzero_media_ssrc_rejected() -> Result<(), util::Error> {
    let remb = ReceiverEstimatedMaximumBitrate {
        sender_ssrc: 1,
        bitrate: 100_000,
        ssrcs: vec![],
    };
    let raw = remb.marshal()?;

    let mut tampered = raw.to_vec();
    tampered[11] = 1; // media ssrc must stay 0

    let mut buf = &tampered[..];
    assert!(ReceiverEstimatedMaximumBitrate::unmarshal(&mut buf).is_err());
    Ok(())
}

#[test]
fn test_remb_missing_identifier_rejected() -> Result<(), util::Error> {
    let remb = ReceiverEstimatedMaximumBitrate {
        sender_ssrc: 1,
        bitrate: 100_000,
        ssrcs: vec![],
    };
    let raw = remb.marshal()?;

    let mut tampered = raw.to_vec();
    tampered[12] = b'X';

    let mut buf = &tampered[..];
    assert!(ReceiverEstimatedMaximumBitrate::unmarshal(&mut buf).is_err());
    Ok(())
}
