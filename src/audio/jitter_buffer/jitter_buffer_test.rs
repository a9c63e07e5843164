use std::time::{Duration, Instant};

use bytes::Bytes;

use super::*;

fn frame(seq: u16, ts: u32, arrival: Instant) -> JitterFrame {
    JitterFrame {
        data: Bytes::from_static(&[0xAB]),
        timestamp: ts,
        sequence_number: seq,
        arrival_time: arrival,
    }
}

fn fixed_config() -> JitterBufferConfig {
    JitterBufferConfig {
        target_delay: Duration::from_millis(50),
        enable_adaptive: false,
        ..Default::default()
    }
}

#[test]
fn test_reorder_on_pop() {
    // Push 5, 4, 7, 6 at 1 ms spacing; pops past the target delay come out
    // sorted with nothing counted lost or duplicated.
    let mut jb = JitterBuffer::new(fixed_config());
    let t = Instant::now();

    for (i, seq) in [5u16, 4, 7, 6].iter().enumerate() {
        let arrival = t + Duration::from_millis(i as u64);
        assert!(jb.push(frame(*seq, *seq as u32 * 960, arrival)));
    }

    let pop_time = t + Duration::from_millis(50 + 4);
    let mut order = vec![];
    while let Some(f) = jb.pop_at(pop_time) {
        order.push(f.sequence_number);
    }
    assert_eq!(order, vec![4, 5, 6, 7]);

    let stats = jb.stats();
    assert_eq!(stats.packets_lost, 0);
    assert_eq!(stats.packets_duplicated, 0);
    assert_eq!(stats.packets_received, 4);
}

#[test]
fn test_pop_respects_target_delay() {
    let mut jb = JitterBuffer::new(fixed_config());
    let t = Instant::now();

    jb.push(frame(1, 960, t));

    // Not aged enough yet.
    assert!(jb.pop_at(t + Duration::from_millis(10)).is_none());
    assert!(!jb.is_ready_at(t + Duration::from_millis(10)));

    assert!(jb.is_ready_at(t + Duration::from_millis(50)));
    assert!(jb.pop_at(t + Duration::from_millis(50)).is_some());
}

#[test]
fn test_duplicate_rejected() {
    let mut jb = JitterBuffer::new(fixed_config());
    let t = Instant::now();

    assert!(jb.push(frame(10, 0, t)));
    assert!(!jb.push(frame(10, 0, t + Duration::from_millis(1))));
    assert_eq!(jb.stats().packets_duplicated, 1);
    assert_eq!(jb.len(), 1);
}

#[test]
fn test_duplicate_of_oldest_rejected_when_full() {
    // A duplicate of the front entry arriving into a full buffer must be
    // rejected without evicting anything.
    let config = JitterBufferConfig {
        max_packets: 3,
        ..fixed_config()
    };
    let mut jb = JitterBuffer::new(config);
    let t = Instant::now();

    for seq in 0..3u16 {
        jb.push(frame(seq, seq as u32 * 960, t + Duration::from_millis(seq as u64)));
    }

    assert!(!jb.push(frame(0, 0, t + Duration::from_millis(5))));

    let stats = jb.stats();
    assert_eq!(stats.packets_duplicated, 1);
    assert_eq!(stats.packets_late, 0);
    assert_eq!(jb.len(), 3);
    assert_eq!(jb.peek().unwrap().sequence_number, 0);
}

#[test]
fn test_gap_counts_as_loss() {
    let mut jb = JitterBuffer::new(fixed_config());
    let t = Instant::now();

    jb.push(frame(100, 0, t));
    jb.push(frame(103, 3 * 960, t + Duration::from_millis(1)));

    let late = t + Duration::from_secs(1);
    assert_eq!(jb.pop_at(late).unwrap().sequence_number, 100);
    assert_eq!(jb.pop_at(late).unwrap().sequence_number, 103);

    // 101 and 102 never arrived.
    let stats = jb.stats();
    assert_eq!(stats.packets_lost, 2);
    assert!(stats.packet_loss_rate > 0.0);
}

#[test]
fn test_sequence_wrap_is_not_duplicate() {
    let mut jb = JitterBuffer::new(fixed_config());
    let t = Instant::now();

    jb.push(frame(65535, 0, t));
    assert!(jb.push(frame(0, 960, t + Duration::from_millis(1))));

    let late = t + Duration::from_secs(1);
    assert_eq!(jb.pop_at(late).unwrap().sequence_number, 65535);
    assert_eq!(jb.pop_at(late).unwrap().sequence_number, 0);
    assert_eq!(jb.stats().packets_lost, 0);
}

#[test]
fn test_overflow_drops_oldest() {
    let config = JitterBufferConfig {
        max_packets: 3,
        ..fixed_config()
    };
    let mut jb = JitterBuffer::new(config);
    let t = Instant::now();

    for seq in 0..4u16 {
        jb.push(frame(seq, seq as u32 * 960, t + Duration::from_millis(seq as u64)));
    }

    assert_eq!(jb.len(), 3);
    assert_eq!(jb.stats().packets_late, 1);
    // Seq 0 was evicted.
    assert_eq!(jb.peek().unwrap().sequence_number, 1);
}

#[test]
fn test_adaptive_delay_tracks_jitter() {
    let config = JitterBufferConfig {
        enable_adaptive: true,
        ..Default::default()
    };
    let mut jb = JitterBuffer::new(config.clone());
    let t = Instant::now();

    // Perfectly paced packets: 20 ms apart in both time and timestamp. The
    // target converges to the 10 ms floor term.
    for i in 0..20u16 {
        jb.push(frame(
            i,
            i as u32 * 960,
            t + Duration::from_millis(20 * i as u64),
        ));
    }
    let target = jb.stats().target_delay;
    assert!(target >= config.min_delay);
    assert!(target <= Duration::from_millis(20));
}

#[test]
fn test_reset_returns_to_not_started() {
    let mut jb = JitterBuffer::new(fixed_config());
    let t = Instant::now();

    jb.push(frame(5, 0, t));
    jb.reset();

    assert!(jb.is_empty());
    assert_eq!(jb.stats().packets_received, 0);
    // Not-started again: pops refuse even well past any delay.
    assert!(jb.pop_at(t + Duration::from_secs(5)).is_none());
}
