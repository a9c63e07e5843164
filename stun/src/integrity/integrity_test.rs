use super::*;
use crate::textattrs::Username;

#[test]
fn test_message_integrity_round_trip() -> Result<()> {
    let integrity = MessageIntegrity::new_short_term_integrity("password".to_owned());

    let mut m = Message::new();
    m.build(&[
        Box::new(BINDING_REQUEST),
        Box::new(TransactionId::new()),
        Box::new(Username::new("remote:local".to_owned())),
        Box::new(integrity.clone()),
    ])?;

    let mut received = Message::new();
    received.write(&m.raw)?;
    integrity.check(&mut received)?;
    Ok(())
}

#[test]
fn test_message_integrity_wrong_password() -> Result<()> {
    let integrity = MessageIntegrity::new_short_term_integrity("password".to_owned());

    let mut m = Message::new();
    m.build(&[
        Box::new(BINDING_REQUEST),
        Box::new(TransactionId::new()),
        Box::new(integrity),
    ])?;

    let mut received = Message::new();
    received.write(&m.raw)?;

    let wrong = MessageIntegrity::new_short_term_integrity("letmein".to_owned());
    assert_eq!(wrong.check(&mut received), Err(Error::ErrIntegrityMismatch));
    Ok(())
}

#[test]
fn test_message_integrity_excludes_fingerprint() -> Result<()> {
    let integrity = MessageIntegrity::new_short_term_integrity("password".to_owned());

    let mut m = Message::new();
    m.build(&[
        Box::new(BINDING_REQUEST),
        Box::new(TransactionId::new()),
        Box::new(integrity.clone()),
        Box::new(crate::fingerprint::FINGERPRINT),
    ])?;

    let mut received = Message::new();
    received.write(&m.raw)?;

    // The integrity hash must still verify even though FINGERPRINT was
    // appended after it.
    integrity.check(&mut received)?;
    crate::fingerprint::FINGERPRINT.check(&received)?;
    Ok(())
}

#[test]
fn test_fingerprint_must_come_after_integrity() -> Result<()> {
    let integrity = MessageIntegrity::new_short_term_integrity("password".to_owned());

    let mut m = Message::new();
    m.build(&[
        Box::new(BINDING_REQUEST),
        Box::new(TransactionId::new()),
        Box::new(crate::fingerprint::FINGERPRINT),
    ])?;

    assert_eq!(
        integrity.add_to(&mut m),
        Err(Error::ErrFingerprintBeforeIntegrity)
    );
    Ok(())
}

#[test]
fn test_long_term_integrity_key_derivation() -> Result<()> {
    let a = MessageIntegrity::new_long_term_integrity(
        "user".to_owned(),
        "realm".to_owned(),
        "pass".to_owned(),
    );
    let b = MessageIntegrity::new_long_term_integrity(
        "user".to_owned(),
        "realm".to_owned(),
        "pass".to_owned(),
    );
    assert_eq!(a.0, b.0);
    assert_eq!(a.0.len(), 16); // MD5 digest

    let c = MessageIntegrity::new_long_term_integrity(
        "user".to_owned(),
        "realm".to_owned(),
        "other".to_owned(),
    );
    assert_ne!(a.0, c.0);
    Ok(())
}
