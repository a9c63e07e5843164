use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use super::*;

#[test]
fn test_bridge_mixes_for_each_participant() {
    let bridge = ConferenceBridge::new(ConferenceBridgeConfig::default());
    bridge.start();

    let mixes = Arc::new(StdMutex::new(HashMap::new()));
    let mixes2 = Arc::clone(&mixes);
    bridge.set_output_callback(Box::new(move |recipient, samples, _ts| {
        mixes2
            .lock()
            .unwrap()
            .insert(recipient.clone(), samples.to_vec());
    }));

    bridge.add_participant(&"a".to_owned());
    bridge.add_participant(&"b".to_owned());
    assert_eq!(bridge.participant_count(), 2);

    let frame = vec![500i16; bridge.mixer().frame_size()];
    bridge.push_audio(&"a".to_owned(), &frame, 960);
    bridge.push_audio(&"b".to_owned(), &frame, 960);
    bridge.process();

    let mixes = mixes.lock().unwrap();
    // Each hears only the other.
    assert!(mixes[&"a".to_owned()].iter().all(|&s| s == 500));
    assert!(mixes[&"b".to_owned()].iter().all(|&s| s == 500));
}

#[test]
fn test_stopped_bridge_is_inert() {
    let bridge = ConferenceBridge::new(ConferenceBridgeConfig::default());

    let called = Arc::new(StdMutex::new(0usize));
    let called2 = Arc::clone(&called);
    bridge.set_output_callback(Box::new(move |_r, _s, _t| {
        *called2.lock().unwrap() += 1;
    }));

    bridge.add_participant(&"a".to_owned());
    let frame = vec![500i16; bridge.mixer().frame_size()];
    bridge.push_audio(&"a".to_owned(), &frame, 960);
    bridge.process();

    assert_eq!(*called.lock().unwrap(), 0);
}

#[test]
fn test_remove_participant_releases_state() {
    let bridge = ConferenceBridge::new(ConferenceBridgeConfig::default());
    bridge.start();

    bridge.add_participant(&"a".to_owned());
    bridge.remove_participant(&"a".to_owned());
    assert_eq!(bridge.participant_count(), 0);
    assert_eq!(bridge.active_speaker(), None);
}
