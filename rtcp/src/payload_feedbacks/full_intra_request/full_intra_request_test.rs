use super::*;

#[test]
fn test_fir_round_trip() -> Result<(), util::Error> {
    let fir = FullIntraRequest {
        sender_ssrc: 0x902F9E2E,
        media_ssrc: 0x902F9E2E,
        fir: vec![FirEntry {
            ssrc: 0x12345678,
            sequence_number: 0x42,
        }],
    };

    let raw = fir.marshal()?;
    assert_eq!(raw.len(), 20);

    let mut buf = raw.clone();
    let parsed = FullIntraRequest::unmarshal(&mut buf)?;
    assert_eq!(parsed, fir);
    Ok(())
}

#[test]
fn test_fir_multiple_entries() -> Result<(), util::Error> {
    let fir = FullIntraRequest {
        sender_ssrc: 1,
        media_ssrc: 0,
        fir: vec![
            FirEntry {
                ssrc: 2,
                sequence_number: 1,
            },
            FirEntry {
                ssrc: 3,
                sequence_number: 2,
            },
        ],
    };

    let raw = fir.marshal()?;
    let mut buf = raw.clone();
    let parsed = FullIntraRequest::unmarshal(&mut buf)?;
    assert_eq!(parsed, fir);
    assert_eq!(parsed.destination_ssrc(), vec![2, 3]);
    Ok(())
}
