use super::*;

#[test]
fn test_receiver_report_round_trip() -> Result<(), util::Error> {
    let rr = ReceiverReport {
        ssrc: 0x902F9E2E,
        reports: vec![ReceptionReport {
            ssrc: 0xBC5E9A40,
            fraction_lost: 81,
            total_lost: 0xA94,
            last_sequence_number: 0x46E1,
            jitter: 273,
            last_sender_report: 0x9F36432,
            delay: 150137,
        }],
    };

    let raw = rr.marshal()?;
    let mut buf = raw.clone();
    let parsed = ReceiverReport::unmarshal(&mut buf)?;
    assert_eq!(parsed, rr);
    Ok(())
}

#[test]
fn test_receiver_report_wrong_type_rejected() -> Result<(), util::Error> {
    let rr = ReceiverReport::default();
    let raw = rr.marshal()?;

    let mut tampered = raw.to_vec();
    tampered[1] = 200; // claim SR

    let mut buf = &tampered[..];
    assert!(ReceiverReport::unmarshal(&mut buf).is_err());
    Ok(())
}

#[test]
fn test_reception_report_total_lost_is_24_bit() {
    let report = ReceptionReport {
        total_lost: 1 << 25,
        ..Default::default()
    };
    assert!(report.marshal().is_err());
}

#[test]
fn test_receiver_report_header() {
    let rr = ReceiverReport {
        ssrc: 1,
        reports: vec![ReceptionReport::default(), ReceptionReport::default()],
    };
    let h = rr.header();
    assert_eq!(h.count, 2);
    assert_eq!(h.packet_type, PacketType::ReceiverReport);
    // 8 bytes + 2*24 = 56 bytes = 14 words - 1
    assert_eq!(h.length, 13);
}
