use super::*;

#[test]
fn test_priority_round_trip() -> Result<(), stun::Error> {
    let mut m = Message::new();
    m.set_type(BINDING_REQUEST);
    m.new_transaction_id();

    PriorityAttr(0x6E7F1EFF).add_to(&mut m)?;

    let mut received = Message::new();
    received.write(&m.raw)?;

    let mut p = PriorityAttr::default();
    p.get_from(&received)?;
    assert_eq!(p.0, 0x6E7F1EFF);
    Ok(())
}

#[test]
fn test_priority_missing() {
    let m = Message::new();
    let mut p = PriorityAttr::default();
    assert_eq!(p.get_from(&m), Err(stun::Error::ErrAttributeNotFound));
}

#[test]
fn test_priority_incorrect_size() {
    let mut m = Message::new();
    m.add(ATTR_PRIORITY, &[0; 100]);

    let mut p = PriorityAttr::default();
    let result = p.get_from(&m);
    assert!(matches!(result, Err(ref e) if is_attr_size_invalid(e)));
}
