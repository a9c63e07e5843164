use std::thread;

use super::audio_ring::AudioRing;
use super::{mpsc, spsc};
use crate::error::Error;

#[test]
fn test_spsc_push_pop() {
    let (mut tx, mut rx) = spsc::channel::<u32>(4);

    assert_eq!(rx.pop(), None);

    for i in 0..4 {
        tx.push(i).unwrap();
    }
    assert_eq!(tx.push(99), Err(Error::ErrBufferFull));

    for i in 0..4 {
        assert_eq!(rx.pop(), Some(i));
    }
    assert_eq!(rx.pop(), None);
}

#[test]
fn test_spsc_cross_thread_ordering() {
    const N: u64 = 100_000;
    let (mut tx, mut rx) = spsc::channel::<u64>(1024);

    let producer = thread::spawn(move || {
        let mut i = 0;
        while i < N {
            if tx.push(i).is_ok() {
                i += 1;
            }
        }
    });

    let mut expected = 0;
    while expected < N {
        if let Some(v) = rx.pop() {
            assert_eq!(v, expected);
            expected += 1;
        }
    }

    producer.join().unwrap();
}

#[test]
fn test_mpsc_multiple_producers() {
    const PRODUCERS: usize = 4;
    const PER_PRODUCER: usize = 10_000;

    let (tx, mut rx) = mpsc::channel::<usize>();

    let handles: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let tx = tx.clone();
            thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    tx.push(p * PER_PRODUCER + i);
                }
            })
        })
        .collect();

    let mut seen = vec![false; PRODUCERS * PER_PRODUCER];
    let mut count = 0;
    while count < PRODUCERS * PER_PRODUCER {
        if let Some(v) = rx.pop() {
            assert!(!seen[v], "duplicate element {v}");
            seen[v] = true;
            count += 1;
        }
    }

    for h in handles {
        h.join().unwrap();
    }
    assert!(rx.is_empty());
}

#[test]
fn test_mpsc_per_producer_order() {
    let (tx, mut rx) = mpsc::channel::<u32>();
    for i in 0..100 {
        tx.push(i);
    }
    for i in 0..100 {
        assert_eq!(rx.pop(), Some(i));
    }
    assert_eq!(rx.pop(), None);
}

#[test]
fn test_audio_ring_wrap_around() {
    let (mut w, mut r) = AudioRing::new(8);

    let frame: Vec<i16> = (0..6).collect();
    assert_eq!(w.write(&frame), 6);
    assert_eq!(r.available(), 6);

    let mut out = [0i16; 6];
    assert_eq!(r.read(&mut out), 6);
    assert_eq!(&out, &[0, 1, 2, 3, 4, 5]);

    // Second write wraps past the end of the backing buffer.
    let frame: Vec<i16> = (10..16).collect();
    assert_eq!(w.write(&frame), 6);
    let mut out = [0i16; 6];
    assert_eq!(r.read(&mut out), 6);
    assert_eq!(&out, &[10, 11, 12, 13, 14, 15]);
}

#[test]
fn test_audio_ring_partial_write_when_full() {
    let (mut w, mut r) = AudioRing::new(4);

    let frame = [1i16; 6];
    assert_eq!(w.write(&frame), 4);
    assert_eq!(w.space(), 0);

    r.clear();
    assert_eq!(w.space(), 4);
    assert_eq!(r.available(), 0);
}
