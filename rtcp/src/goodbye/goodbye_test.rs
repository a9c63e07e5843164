use super::*;

#[test]
fn test_goodbye_round_trip() -> Result<(), util::Error> {
    let bye = Goodbye {
        sources: vec![0x902F9E2E, 0xDEADBEEF],
        reason: "session ended".to_owned(),
    };

    let raw = bye.marshal()?;
    assert_eq!(raw.len() % 4, 0);

    let mut buf = raw.clone();
    let parsed = Goodbye::unmarshal(&mut buf)?;
    assert_eq!(parsed.sources, bye.sources);
    assert_eq!(parsed.reason, bye.reason);
    Ok(())
}

#[test]
fn test_goodbye_no_reason() -> Result<(), util::Error> {
    let bye = Goodbye {
        sources: vec![1],
        reason: String::new(),
    };

    let raw = bye.marshal()?;
    assert_eq!(raw.len(), 8);

    let mut buf = raw.clone();
    let parsed = Goodbye::unmarshal(&mut buf)?;
    assert_eq!(parsed, bye);
    Ok(())
}

#[test]
fn test_goodbye_reason_too_long_rejected() {
    let bye = Goodbye {
        sources: vec![1],
        reason: "x".repeat(300),
    };
    assert!(bye.marshal().is_err());
}
