use std::sync::{Arc, Mutex as StdMutex};

use super::*;

fn three_layers() -> Vec<SimulcastLayerInfo> {
    vec![
        SimulcastLayerInfo {
            layer_index: 0,
            bitrate_kbps: 150,
            is_active: true,
            ..Default::default()
        },
        SimulcastLayerInfo {
            layer_index: 1,
            bitrate_kbps: 500,
            is_active: true,
            ..Default::default()
        },
        SimulcastLayerInfo {
            layer_index: 2,
            bitrate_kbps: 1500,
            is_active: true,
            ..Default::default()
        },
    ]
}

fn manager_with_stream() -> SubscriptionManager {
    let mgr = SubscriptionManager::new();
    mgr.set_available_layers(&"pub".to_owned(), &"video0".to_owned(), three_layers());
    mgr
}

#[test]
fn test_auto_layer_follows_bandwidth() {
    let mgr = manager_with_stream();
    mgr.subscribe(&"sub".to_owned(), &"pub".to_owned(), &"video0".to_owned(), -1);

    // 600 kbps estimate: only layers 0 and 1 fit.
    mgr.update_bandwidth(
        &"sub".to_owned(),
        BandwidthInfo {
            estimated_bps: 600_000,
            ..Default::default()
        },
    );
    mgr.process();
    assert_eq!(mgr.current_layer(&"sub".to_owned(), &"pub".to_owned()), Some(1));

    // Bandwidth recovers: the top layer fits.
    mgr.update_bandwidth(
        &"sub".to_owned(),
        BandwidthInfo {
            estimated_bps: 2_000_000,
            ..Default::default()
        },
    );
    mgr.process();
    assert_eq!(mgr.current_layer(&"sub".to_owned(), &"pub".to_owned()), Some(2));

    // Starved: fall to the bottom.
    mgr.update_bandwidth(
        &"sub".to_owned(),
        BandwidthInfo {
            estimated_bps: 50_000,
            ..Default::default()
        },
    );
    mgr.process();
    assert_eq!(mgr.current_layer(&"sub".to_owned(), &"pub".to_owned()), Some(0));
}

#[test]
fn test_no_bandwidth_info_defaults_to_highest() {
    let mgr = manager_with_stream();
    mgr.subscribe(&"sub".to_owned(), &"pub".to_owned(), &"video0".to_owned(), -1);

    mgr.process();
    assert_eq!(mgr.current_layer(&"sub".to_owned(), &"pub".to_owned()), Some(2));
}

#[test]
fn test_no_bandwidth_default_is_capped_by_registered_layers() {
    // A publisher announcing only layers 0 and 1 must never pin a fresh
    // subscriber to layer 2: no stream would ever match it.
    let mgr = SubscriptionManager::new();
    let mut layers = three_layers();
    layers.truncate(2);
    mgr.set_available_layers(&"pub".to_owned(), &"video0".to_owned(), layers);

    mgr.subscribe(&"sub".to_owned(), &"pub".to_owned(), &"video0".to_owned(), -1);
    mgr.process();
    assert_eq!(mgr.current_layer(&"sub".to_owned(), &"pub".to_owned()), Some(1));

    // With only inactive layers (or none registered) the default is 0.
    let mgr = SubscriptionManager::new();
    let mut layers = three_layers();
    for l in &mut layers {
        l.is_active = false;
    }
    mgr.set_available_layers(&"pub".to_owned(), &"video0".to_owned(), layers);
    mgr.subscribe(&"sub".to_owned(), &"pub".to_owned(), &"video0".to_owned(), -1);
    mgr.process();
    assert_eq!(mgr.current_layer(&"sub".to_owned(), &"pub".to_owned()), Some(0));
}

#[test]
fn test_explicit_target_layer_is_honored() {
    let mgr = manager_with_stream();
    mgr.subscribe(&"sub".to_owned(), &"pub".to_owned(), &"video0".to_owned(), 1);

    // Bandwidth says the top layer would fit; the pin wins.
    mgr.update_bandwidth(
        &"sub".to_owned(),
        BandwidthInfo {
            estimated_bps: 5_000_000,
            ..Default::default()
        },
    );
    mgr.process();
    assert_eq!(mgr.current_layer(&"sub".to_owned(), &"pub".to_owned()), Some(1));
}

#[test]
fn test_paused_subscription_is_not_adjusted() {
    let mgr = manager_with_stream();
    mgr.subscribe(&"sub".to_owned(), &"pub".to_owned(), &"video0".to_owned(), -1);
    mgr.set_paused(&"sub".to_owned(), &"pub".to_owned(), true);

    mgr.update_bandwidth(
        &"sub".to_owned(),
        BandwidthInfo {
            estimated_bps: 5_000_000,
            ..Default::default()
        },
    );
    mgr.process();
    assert_eq!(mgr.current_layer(&"sub".to_owned(), &"pub".to_owned()), Some(0));
}

#[test]
fn test_switch_callback_reports_transitions() {
    let mgr = manager_with_stream();
    mgr.subscribe(&"sub".to_owned(), &"pub".to_owned(), &"video0".to_owned(), -1);

    let switches = Arc::new(StdMutex::new(vec![]));
    let switches2 = Arc::clone(&switches);
    mgr.set_layer_switch_callback(Box::new(move |sub, publisher, old, new| {
        switches2
            .lock()
            .unwrap()
            .push((sub.clone(), publisher.clone(), old, new));
    }));

    mgr.update_bandwidth(
        &"sub".to_owned(),
        BandwidthInfo {
            estimated_bps: 600_000,
            ..Default::default()
        },
    );
    mgr.process();
    // Re-running with unchanged bandwidth must not fire again.
    mgr.process();

    let switches = switches.lock().unwrap();
    assert_eq!(switches.len(), 1);
    assert_eq!(switches[0], ("sub".to_owned(), "pub".to_owned(), 0, 1));
}

#[test]
fn test_inactive_layers_are_skipped() {
    let mgr = SubscriptionManager::new();
    let mut layers = three_layers();
    layers[2].is_active = false;
    mgr.set_available_layers(&"pub".to_owned(), &"video0".to_owned(), layers);

    mgr.subscribe(&"sub".to_owned(), &"pub".to_owned(), &"video0".to_owned(), -1);
    mgr.update_bandwidth(
        &"sub".to_owned(),
        BandwidthInfo {
            estimated_bps: 10_000_000,
            ..Default::default()
        },
    );
    mgr.process();

    // Plenty of bandwidth, but the top layer is inactive.
    assert_eq!(mgr.current_layer(&"sub".to_owned(), &"pub".to_owned()), Some(1));
}

#[test]
fn test_unsubscribe_releases_state() {
    let mgr = manager_with_stream();
    mgr.subscribe(&"sub".to_owned(), &"pub".to_owned(), &"video0".to_owned(), -1);
    assert_eq!(mgr.subscription_count(), 1);

    mgr.unsubscribe(&"sub".to_owned(), &"pub".to_owned());
    assert_eq!(mgr.subscription_count(), 0);
    assert_eq!(mgr.current_layer(&"sub".to_owned(), &"pub".to_owned()), None);
}
