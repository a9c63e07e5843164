use super::*;

#[test]
fn test_controlling_round_trip() -> Result<(), stun::Error> {
    let mut m = Message::new();
    m.build(&[
        Box::new(BINDING_REQUEST),
        Box::new(TransactionId::new()),
        Box::new(AttrControlling(4321)),
    ])?;

    let mut received = Message::new();
    received.write(&m.raw)?;

    let mut c = AttrControlling::default();
    c.get_from(&received)?;
    assert_eq!(c.0, 4321);

    // The other role attribute must not be present.
    let mut other = AttrControlled::default();
    assert!(other.get_from(&received).is_err());
    Ok(())
}

#[test]
fn test_controlled_round_trip() -> Result<(), stun::Error> {
    let mut m = Message::new();
    m.build(&[
        Box::new(BINDING_REQUEST),
        Box::new(TransactionId::new()),
        Box::new(AttrControlled(99)),
    ])?;

    let mut received = Message::new();
    received.write(&m.raw)?;

    let mut c = AttrControlled::default();
    c.get_from(&received)?;
    assert_eq!(c.0, 99);
    Ok(())
}
