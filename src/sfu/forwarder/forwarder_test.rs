use std::sync::{Arc, Mutex as StdMutex};

use super::*;

fn dest(port: u16) -> SocketAddr {
    format!("127.0.0.1:{port}").parse().unwrap()
}

fn rule(subscriber: &str, port: u16, rewritten_ssrc: u32) -> ForwardingRule {
    ForwardingRule {
        subscriber_id: subscriber.to_owned(),
        destination: dest(port),
        rewritten_ssrc,
        preferred_layer: -1,
        active: true,
    }
}

type Captured = Arc<StdMutex<Vec<(ParticipantId, Vec<u8>, SocketAddr)>>>;

fn capturing_forwarder() -> (RtpForwarder, Captured) {
    let fwd = RtpForwarder::new();
    let captured: Captured = Arc::new(StdMutex::new(vec![]));
    let captured2 = Arc::clone(&captured);
    fwd.set_forward_callback(Box::new(move |subscriber, packet, dest| {
        captured2
            .lock()
            .unwrap()
            .push((subscriber.clone(), packet.to_vec(), dest));
    }));
    (fwd, captured)
}

fn rtp_packet(ssrc: u32) -> Vec<u8> {
    let mut p = vec![
        0x80, 0x6F, 0x00, 0x01, 0x00, 0x00, 0x00, 0x10, 0, 0, 0, 0, 0xAA, 0xBB,
    ];
    p[8..12].copy_from_slice(&ssrc.to_be_bytes());
    p
}

#[test]
fn test_ssrc_rewrite() {
    let (fwd, captured) = capturing_forwarder();
    let source = dest(9999);

    fwd.add_publisher(
        &"pub".to_owned(),
        &"video0".to_owned(),
        RtpStreamInfo {
            ssrc: 0x0000_0001,
            payload_type: 111,
            ..Default::default()
        },
    );
    fwd.add_subscription(&"pub".to_owned(), &"sub".to_owned(), rule("sub", 4000, 0x99));

    let packet = rtp_packet(0x0000_0001);
    fwd.on_rtp_packet(0x0000_0001, &packet, source);

    let captured = captured.lock().unwrap();
    assert_eq!(captured.len(), 1);

    let (ref subscriber, ref forwarded, to) = captured[0];
    assert_eq!(subscriber, "sub");
    assert_eq!(to, dest(4000));

    // Bytes identical except offsets 8-11 carrying the rewritten SSRC.
    assert_eq!(&forwarded[..8], &packet[..8]);
    assert_eq!(&forwarded[8..12], &[0x00, 0x00, 0x00, 0x99]);
    assert_eq!(&forwarded[12..], &packet[12..]);
}

#[test]
fn test_pass_through_keeps_bytes_identical() {
    let (fwd, captured) = capturing_forwarder();

    fwd.add_publisher(
        &"pub".to_owned(),
        &"audio0".to_owned(),
        RtpStreamInfo {
            ssrc: 0xDEADBEEF,
            is_audio: true,
            ..Default::default()
        },
    );
    fwd.add_subscription(&"pub".to_owned(), &"sub".to_owned(), rule("sub", 4001, 0));

    let packet = rtp_packet(0xDEADBEEF);
    fwd.on_rtp_packet(0xDEADBEEF, &packet, dest(9999));

    let captured = captured.lock().unwrap();
    assert_eq!(captured[0].1, packet);
}

#[test]
fn test_unknown_ssrc_is_dropped() {
    let (fwd, captured) = capturing_forwarder();

    fwd.on_rtp_packet(0x1234, &rtp_packet(0x1234), dest(9999));

    assert!(captured.lock().unwrap().is_empty());
    let stats = fwd.stats();
    assert_eq!(stats.packets_dropped, 1);
    assert_eq!(stats.packets_forwarded, 0);
}

#[test]
fn test_simulcast_layer_filter() {
    let (fwd, captured) = capturing_forwarder();
    let publisher = "pub".to_owned();

    // Two layers on two SSRCs.
    for (ssrc, layer) in [(100u32, 0i32), (200, 1)] {
        fwd.add_publisher(
            &publisher,
            &format!("video-l{layer}"),
            RtpStreamInfo {
                ssrc,
                simulcast_layer: layer,
                ..Default::default()
            },
        );
    }

    let mut r = rule("sub", 4002, 0);
    r.preferred_layer = 1;
    fwd.add_subscription(&publisher, &"sub".to_owned(), r);

    // Layer 0 packet filtered, layer 1 packet forwarded.
    fwd.on_rtp_packet(100, &rtp_packet(100), dest(9999));
    fwd.on_rtp_packet(200, &rtp_packet(200), dest(9999));

    let captured = captured.lock().unwrap();
    assert_eq!(captured.len(), 1);
    assert_eq!(&captured[0].1[8..12], &200u32.to_be_bytes());
}

#[test]
fn test_forwarded_count_matches_layer_filter() {
    let (fwd, _captured) = capturing_forwarder();
    let publisher = "pub".to_owned();

    for (ssrc, layer) in [(100u32, 0i32), (200, 1)] {
        fwd.add_publisher(
            &publisher,
            &format!("video-l{layer}"),
            RtpStreamInfo {
                ssrc,
                simulcast_layer: layer,
                ..Default::default()
            },
        );
    }
    let mut r = rule("sub", 4002, 0);
    r.preferred_layer = 0;
    fwd.add_subscription(&publisher, &"sub".to_owned(), r);

    for _ in 0..10 {
        fwd.on_rtp_packet(100, &rtp_packet(100), dest(9999));
        fwd.on_rtp_packet(200, &rtp_packet(200), dest(9999));
    }

    let stats = fwd.stats();
    assert_eq!(stats.packets_received, 20);
    // Only the 10 layer-0 packets match the preference.
    assert_eq!(stats.packets_forwarded, 10);
}

#[test]
fn test_inactive_rule_is_skipped() {
    let (fwd, captured) = capturing_forwarder();

    fwd.add_publisher(
        &"pub".to_owned(),
        &"audio0".to_owned(),
        RtpStreamInfo {
            ssrc: 1,
            ..Default::default()
        },
    );
    let mut r = rule("sub", 4003, 0);
    r.active = false;
    fwd.add_subscription(&"pub".to_owned(), &"sub".to_owned(), r);

    fwd.on_rtp_packet(1, &rtp_packet(1), dest(9999));
    assert!(captured.lock().unwrap().is_empty());
}

#[test]
fn test_remove_publisher_releases_state() {
    let (fwd, captured) = capturing_forwarder();
    let publisher = "pub".to_owned();

    fwd.add_publisher(
        &publisher,
        &"audio0".to_owned(),
        RtpStreamInfo {
            ssrc: 7,
            ..Default::default()
        },
    );
    fwd.add_subscription(&publisher, &"sub".to_owned(), rule("sub", 4004, 0));
    assert_eq!(fwd.publishers(), vec![publisher.clone()]);
    assert_eq!(fwd.subscribers(&publisher), vec!["sub".to_owned()]);

    fwd.remove_publisher(&publisher, &"audio0".to_owned());
    assert!(fwd.publishers().is_empty());

    fwd.on_rtp_packet(7, &rtp_packet(7), dest(9999));
    assert!(captured.lock().unwrap().is_empty());
    assert_eq!(fwd.stats().packets_dropped, 1);
}
