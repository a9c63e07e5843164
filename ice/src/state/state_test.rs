use super::*;

#[test]
fn test_connection_state_display() {
    let tests = [
        (ConnectionState::Unspecified, "Unspecified"),
        (ConnectionState::New, "New"),
        (ConnectionState::Checking, "Checking"),
        (ConnectionState::Connected, "Connected"),
        (ConnectionState::Completed, "Completed"),
        (ConnectionState::Failed, "Failed"),
        (ConnectionState::Disconnected, "Disconnected"),
        (ConnectionState::Closed, "Closed"),
    ];
    for (state, expected) in tests {
        assert_eq!(state.to_string(), expected);
    }
}

#[test]
fn test_gathering_state_display() {
    assert_eq!(GatheringState::New.to_string(), "new");
    assert_eq!(GatheringState::Gathering.to_string(), "gathering");
    assert_eq!(GatheringState::Complete.to_string(), "complete");
}
