
use std::fmt;
use std::sync::{Arc, Mutex};

/// Sequencer generates sequential sequence numbers for building RTP packets.
pub trait Sequencer: fmt::Debug + Send + Sync {
    fn next_sequence_number(&self) -> u16;
    fn roll_over_count(&self) -> u64;
}

/// Returns a new sequencer starting from a random sequence number.
pub fn new_random_sequencer() -> impl Sequencer {
    new_fixed_sequencer(rand::random::<u16>())
}

/// Returns a new sequencer starting from a specific sequence number.
pub fn new_fixed_sequencer(s: u16) -> impl Sequencer {
    SequencerImpl {
        mutex: Arc::new(Mutex::new(SequencerInternal {
            sequence_number: s.wrapping_sub(1),
            roll_over_count: 0,
        })),
    }
}

struct SequencerInternal {
    sequence_number: u16,
    roll_over_count: u64,
}

#[derive(Clone)]
struct SequencerImpl {
    mutex: Arc<Mutex<SequencerInternal>>,
}

impl fmt::Debug for SequencerImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequencerImpl").finish()
    }
}

impl Sequencer for SequencerImpl {
    /// Increments and returns a new sequence number, handling roll-over.
    fn next_sequence_number(&self) -> u16 {
        let mut s = self.mutex.lock().unwrap();
        s.sequence_number = s.sequence_number.wrapping_add(1);
        if s.sequence_number == 0 {
            s.roll_over_count += 1;
        }
        s.sequence_number
    }

    /// Returns the number of times the 16-bit sequence number has wrapped.
    fn roll_over_count(&self) -> u64 {
        let s = self.mutex.lock().unwrap();
        s.roll_over_count
    }
}

/// Signed distance from `b` to `a` on the 16-bit sequence circle.
///
/// Positive when `a` is newer than `b`; a packet with seq 0 arriving after
/// 65535 is one step ahead, not 65535 behind.
#[inline]
pub fn seq_delta(a: u16, b: u16) -> i16 {
    a.wrapping_sub(b) as i16
}

/// True when sequence `a` is newer than `b` modulo 2^16.
#[inline]
pub fn seq_newer(a: u16, b: u16) -> bool {
    seq_delta(a, b) > 0
}
