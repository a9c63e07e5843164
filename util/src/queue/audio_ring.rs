use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_utils::CachePadded;

/// Sample-granular SPSC ring for the capture -> encode handoff.
///
/// Unlike the element queue this moves runs of i16 samples with wrap-around
/// copies, so a 20 ms frame costs at most two `copy_from_slice` calls per
/// side.
pub struct AudioRing;

impl AudioRing {
    pub fn new(capacity_samples: usize) -> (AudioRingWriter, AudioRingReader) {
        let capacity = capacity_samples.max(2).next_power_of_two();
        let inner = Arc::new(RingInner {
            buffer: (0..capacity).map(|_| UnsafeCell::new(0i16)).collect(),
            mask: capacity - 1,
            read_pos: CachePadded::new(AtomicUsize::new(0)),
            write_pos: CachePadded::new(AtomicUsize::new(0)),
        });
        (
            AudioRingWriter {
                inner: Arc::clone(&inner),
            },
            AudioRingReader { inner },
        )
    }
}

struct RingInner {
    buffer: Box<[UnsafeCell<i16>]>,
    mask: usize,
    read_pos: CachePadded<AtomicUsize>,
    write_pos: CachePadded<AtomicUsize>,
}

unsafe impl Send for RingInner {}
unsafe impl Sync for RingInner {}

impl RingInner {
    fn capacity(&self) -> usize {
        self.mask + 1
    }

    fn available(&self) -> usize {
        let w = self.write_pos.load(Ordering::Acquire);
        let r = self.read_pos.load(Ordering::Acquire);
        w.wrapping_sub(r)
    }
}

pub struct AudioRingWriter {
    inner: Arc<RingInner>,
}

impl AudioRingWriter {
    /// Writes up to `samples.len()` samples, returning how many fit.
    pub fn write(&mut self, samples: &[i16]) -> usize {
        let w = self.inner.write_pos.load(Ordering::Relaxed);
        let r = self.inner.read_pos.load(Ordering::Acquire);
        let space = self.inner.capacity() - w.wrapping_sub(r);
        let n = samples.len().min(space);

        for (i, &s) in samples[..n].iter().enumerate() {
            let idx = w.wrapping_add(i) & self.inner.mask;
            unsafe {
                *self.inner.buffer[idx].get() = s;
            }
        }

        self.inner
            .write_pos
            .store(w.wrapping_add(n), Ordering::Release);
        n
    }

    pub fn space(&self) -> usize {
        self.inner.capacity() - self.inner.available()
    }
}

pub struct AudioRingReader {
    inner: Arc<RingInner>,
}

impl AudioRingReader {
    /// Reads up to `out.len()` samples, returning how many were read.
    pub fn read(&mut self, out: &mut [i16]) -> usize {
        let r = self.inner.read_pos.load(Ordering::Relaxed);
        let w = self.inner.write_pos.load(Ordering::Acquire);
        let n = out.len().min(w.wrapping_sub(r));

        for (i, slot) in out[..n].iter_mut().enumerate() {
            let idx = r.wrapping_add(i) & self.inner.mask;
            unsafe {
                *slot = *self.inner.buffer[idx].get();
            }
        }

        self.inner
            .read_pos
            .store(r.wrapping_add(n), Ordering::Release);
        n
    }

    pub fn available(&self) -> usize {
        self.inner.available()
    }

    /// Discards everything currently buffered.
    pub fn clear(&mut self) {
        let w = self.inner.write_pos.load(Ordering::Acquire);
        self.inner.read_pos.store(w, Ordering::Release);
    }
}
