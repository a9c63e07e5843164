#[cfg(test)]
mod jitter_buffer_test;

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use bytes::Bytes;
use rtp::sequence::seq_delta;

/// A received audio packet queued for playout.
#[derive(Debug, Clone)]
pub struct JitterFrame {
    pub data: Bytes,
    /// RTP timestamp in sample units.
    pub timestamp: u32,
    pub sequence_number: u16,
    pub arrival_time: Instant,
}

#[derive(Debug, Clone)]
pub struct JitterBufferConfig {
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub target_delay: Duration,
    /// Packets buffered beyond this evict the oldest.
    pub max_packets: usize,
    /// Sample rate of the RTP clock, for timestamp-to-wallclock conversion.
    pub sample_rate: u32,
    pub enable_adaptive: bool,
}

impl Default for JitterBufferConfig {
    fn default() -> Self {
        JitterBufferConfig {
            min_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(200),
            target_delay: Duration::from_millis(50),
            max_packets: 100,
            sample_rate: 48000,
            enable_adaptive: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct JitterBufferStats {
    pub current_size: usize,
    pub target_delay: Duration,
    pub packet_loss_rate: f32,
    pub jitter_ms: f32,
    pub packets_received: u64,
    pub packets_lost: u64,
    pub packets_late: u64,
    pub packets_duplicated: u64,
}

/// Adaptive jitter buffer: reorders packets by sequence number, delays
/// playout by an estimate-driven target, and accounts for loss, duplication
/// and late arrivals.
pub struct JitterBuffer {
    config: JitterBufferConfig,
    buffer: VecDeque<JitterFrame>,

    expected_sequence: u16,
    sequence_initialized: bool,
    playout_started: bool,

    // RFC 3550 interarrival jitter state.
    jitter_estimate: f32,
    last_arrival: Option<(Instant, u32)>,

    stats: JitterBufferStats,
}

impl JitterBuffer {
    pub fn new(config: JitterBufferConfig) -> Self {
        let stats = JitterBufferStats {
            target_delay: config.target_delay,
            ..Default::default()
        };
        JitterBuffer {
            config,
            buffer: VecDeque::new(),
            expected_sequence: 0,
            sequence_initialized: false,
            playout_started: false,
            jitter_estimate: 0.0,
            last_arrival: None,
            stats,
        }
    }

    /// Inserts a packet in sequence order. Returns false for duplicates.
    pub fn push(&mut self, frame: JitterFrame) -> bool {
        // Duplicates are rejected outright, before anything is evicted for
        // them.
        if self
            .buffer
            .iter()
            .any(|f| f.sequence_number == frame.sequence_number)
        {
            self.stats.packets_duplicated += 1;
            return false;
        }

        if self.buffer.len() >= self.config.max_packets {
            // Drop the oldest to make room.
            self.buffer.pop_front();
            self.stats.packets_late += 1;
        }

        if !self.sequence_initialized {
            self.expected_sequence = frame.sequence_number;
            self.sequence_initialized = true;
        }

        self.update_jitter(&frame);
        self.adapt_delay();

        // Insert before the first queued frame that is newer.
        let pos = self
            .buffer
            .iter()
            .position(|f| seq_delta(frame.sequence_number, f.sequence_number) < 0)
            .unwrap_or(self.buffer.len());
        self.buffer.insert(pos, frame);

        self.playout_started = true;
        self.stats.packets_received += 1;
        self.stats.current_size = self.buffer.len();
        true
    }

    /// Removes and returns the next frame once it has aged past the target
    /// delay. Detects sequence gaps as losses.
    pub fn pop(&mut self) -> Option<JitterFrame> {
        self.pop_at(Instant::now())
    }

    pub fn pop_at(&mut self, now: Instant) -> Option<JitterFrame> {
        if !self.playout_started {
            return None;
        }

        let front_age = now.checked_duration_since(self.buffer.front()?.arrival_time)?;
        if front_age < self.stats.target_delay {
            return None;
        }

        let frame = self.buffer.pop_front()?;

        let gap = seq_delta(frame.sequence_number, self.expected_sequence);
        if gap > 0 {
            self.stats.packets_lost += gap as u64;
        }
        self.expected_sequence = frame.sequence_number.wrapping_add(1);
        self.stats.current_size = self.buffer.len();

        if self.stats.packets_received > 0 {
            self.stats.packet_loss_rate = self.stats.packets_lost as f32
                / (self.stats.packets_received + self.stats.packets_lost) as f32;
        }

        Some(frame)
    }

    pub fn peek(&self) -> Option<&JitterFrame> {
        self.buffer.front()
    }

    /// True once the front frame has aged past the target delay.
    pub fn is_ready(&self) -> bool {
        self.is_ready_at(Instant::now())
    }

    pub fn is_ready_at(&self, now: Instant) -> bool {
        match self.buffer.front() {
            Some(front) => {
                now.checked_duration_since(front.arrival_time)
                    .map_or(false, |age| age >= self.stats.target_delay)
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn stats(&self) -> JitterBufferStats {
        self.stats.clone()
    }

    /// Returns to the not-started state, clearing contents and statistics.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.sequence_initialized = false;
        self.playout_started = false;
        self.jitter_estimate = 0.0;
        self.last_arrival = None;
        self.stats = JitterBufferStats {
            target_delay: self.config.target_delay,
            ..Default::default()
        };
    }

    pub fn set_target_delay(&mut self, delay: Duration) {
        self.stats.target_delay = delay.clamp(self.config.min_delay, self.config.max_delay);
    }

    /// RFC 3550 A.8: D is the difference between the arrival spacing and the
    /// RTP timestamp spacing; J accumulates |D| with gain 1/16.
    fn update_jitter(&mut self, frame: &JitterFrame) {
        if let Some((last_arrival, last_timestamp)) = self.last_arrival {
            let arrival_ms = frame
                .arrival_time
                .saturating_duration_since(last_arrival)
                .as_secs_f32()
                * 1000.0;
            let timestamp_ms = frame.timestamp.wrapping_sub(last_timestamp) as i32 as f32
                / (self.config.sample_rate as f32 / 1000.0);

            let d = (arrival_ms - timestamp_ms).abs();
            self.jitter_estimate += (d - self.jitter_estimate) / 16.0;
            self.stats.jitter_ms = self.jitter_estimate;
        }
        self.last_arrival = Some((frame.arrival_time, frame.timestamp));
    }

    /// Tracks the playout target at 2·jitter + 10 ms, clamped to the
    /// configured window.
    fn adapt_delay(&mut self) {
        if !self.config.enable_adaptive {
            return;
        }
        let new_delay = Duration::from_millis((self.jitter_estimate * 2.0 + 10.0) as u64);
        self.stats.target_delay = new_delay.clamp(self.config.min_delay, self.config.max_delay);
    }
}
