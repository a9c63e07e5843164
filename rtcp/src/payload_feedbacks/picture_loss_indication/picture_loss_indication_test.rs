use super::*;

#[test]
fn test_pli_round_trip() -> Result<(), util::Error> {
    let pli = PictureLossIndication {
        sender_ssrc: 0x902F9E2E,
        media_ssrc: 0x902F9E2E,
    };

    let raw = pli.marshal()?;
    assert_eq!(raw.len(), 12);

    let mut buf = raw.clone();
    let parsed = PictureLossIndication::unmarshal(&mut buf)?;
    assert_eq!(parsed, pli);
    Ok(())
}

#[test]
fn test_pli_header_format() {
    let pli = PictureLossIndication {
        sender_ssrc: 1,
        media_ssrc: 2,
    };
    let h = pli.header();
    assert_eq!(h.count, FORMAT_PLI);
    assert_eq!(h.packet_type, PacketType::PayloadSpecificFeedback);
    assert_eq!(h.length, 2);
    assert_eq!(pli.destination_ssrc(), vec![2]);
}

#[test]
fn test_pli_wrong_fmt_rejected() -> Result<(), util::Error> {
    let pli = PictureLossIndication {
        sender_ssrc: 1,
        media_ssrc: 2,
    };
    let raw = pli.marshal()?;

    let mut tampered = raw.to_vec();
    tampered[0] = (tampered[0] & 0xE0) | FORMAT_FIR; // claim FIR

    let mut buf = &tampered[..];
    assert!(PictureLossIndication::unmarshal(&mut buf).is_err());
    Ok(())
}
