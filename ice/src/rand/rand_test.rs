use super::*;

#[test]
fn test_random_generator_collision() {
    // A handful of draws must all differ.
    let mut seen = std::collections::HashSet::new();
    for _ in 0..32 {
        assert!(seen.insert(generate_pwd()));
    }
}

#[test]
fn test_credential_lengths() {
    assert_eq!(generate_ufrag().len(), 16);
    // RFC 8445 requires >= 22 characters for the password.
    assert!(generate_pwd().len() >= 22);
}
