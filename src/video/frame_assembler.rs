
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use rtp::sequence::{seq_delta, seq_newer};

/// How far behind the highest received sequence the NACK scan looks.
const NACK_WINDOW: u16 = 100;
/// Received-sequence bookkeeping kept beyond the NACK window.
const SEQUENCE_HISTORY: u16 = 1000;
/// Dropped frames beyond this trip the keyframe-request rule.
const KEYFRAME_REQUEST_DROP_THRESHOLD: u64 = 10;

#[derive(Debug, Clone)]
pub struct FrameAssemblerConfig {
    /// Complete frames age this long before popping.
    pub target_delay: Duration,
    /// Complete frames older than this are abandoned; partial frames get
    /// twice as long before eviction.
    pub max_delay: Duration,
    /// Suppress delta frames until a keyframe has been emitted.
    pub wait_for_keyframe: bool,
}

impl Default for FrameAssemblerConfig {
    fn default() -> Self {
        FrameAssemblerConfig {
            target_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(500),
            wait_for_keyframe: true,
        }
    }
}

/// A fully reassembled video frame ready for decode.
#[derive(Debug, Clone)]
pub struct BufferedFrame {
    pub data: Bytes,
    pub rtp_timestamp: u32,
    pub sequence_start: u16,
    pub sequence_end: u16,
    pub is_keyframe: bool,
    pub arrival_time: Instant,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FrameAssemblerStats {
    pub packets_received: u64,
    pub frames_assembled: u64,
    pub frames_popped: u64,
    pub frames_dropped: u64,
}

/// Packets of one frame (one RTP timestamp) collected so far.
struct PartialFrame {
    timestamp: u32,
    packets: HashMap<u16, Bytes>,
    first_sequence: u16,
    last_sequence: u16,
    has_first: bool,
    has_last: bool,
    is_keyframe: bool,
    first_arrival: Instant,
}

impl PartialFrame {
    fn new(timestamp: u32, now: Instant) -> Self {
        PartialFrame {
            timestamp,
            packets: HashMap::new(),
            first_sequence: 0,
            last_sequence: 0,
            has_first: false,
            has_last: false,
            is_keyframe: false,
            first_arrival: now,
        }
    }

    /// A frame is complete when the first and last packets are known and no
    /// sequence between them is missing. Frames are assumed to span far
    /// fewer than 32768 sequences, so signed deltas stay well-defined.
    fn is_complete(&self) -> bool {
        if !self.has_first || !self.has_last {
            return false;
        }
        let mut seq = self.first_sequence;
        loop {
            if !self.packets.contains_key(&seq) {
                return false;
            }
            if seq == self.last_sequence {
                return true;
            }
            seq = seq.wrapping_add(1);
        }
    }

    fn assemble(&self) -> BufferedFrame {
        let mut data = BytesMut::new();
        let mut seq = self.first_sequence;
        loop {
            if let Some(p) = self.packets.get(&seq) {
                data.extend_from_slice(p);
            }
            if seq == self.last_sequence {
                break;
            }
            seq = seq.wrapping_add(1);
        }

        BufferedFrame {
            data: data.freeze(),
            rtp_timestamp: self.timestamp,
            sequence_start: self.first_sequence,
            sequence_end: self.last_sequence,
            is_keyframe: self.is_keyframe,
            arrival_time: self.first_arrival,
        }
    }
}

/// Reassembles RTP packets into video frames, keyed by RTP timestamp, and
/// tracks the missing-sequence list for NACK generation.
pub struct FrameAssembler {
    config: FrameAssemblerConfig,

    assemblers: HashMap<u32, PartialFrame>,
    complete_frames: VecDeque<BufferedFrame>,

    received_sequences: HashSet<u16>,
    highest_sequence: u16,
    highest_initialized: bool,
    has_keyframe: bool,

    stats: FrameAssemblerStats,
}

impl FrameAssembler {
    pub fn new(config: FrameAssemblerConfig) -> Self {
        FrameAssembler {
            config,
            assemblers: HashMap::new(),
            complete_frames: VecDeque::new(),
            received_sequences: HashSet::new(),
            highest_sequence: 0,
            highest_initialized: false,
            has_keyframe: false,
            stats: FrameAssemblerStats::default(),
        }
    }

    pub fn insert_packet(
        &mut self,
        payload: Bytes,
        sequence: u16,
        timestamp: u32,
        marker: bool,
        is_keyframe_packet: bool,
    ) {
        self.insert_packet_at(payload, sequence, timestamp, marker, is_keyframe_packet, Instant::now())
    }

    pub fn insert_packet_at(
        &mut self,
        payload: Bytes,
        sequence: u16,
        timestamp: u32,
        marker: bool,
        is_keyframe_packet: bool,
        now: Instant,
    ) {
        self.stats.packets_received += 1;

        self.received_sequences.insert(sequence);
        self.received_sequences
            .remove(&sequence.wrapping_sub(SEQUENCE_HISTORY));
        if !self.highest_initialized || seq_newer(sequence, self.highest_sequence) {
            self.highest_sequence = sequence;
            self.highest_initialized = true;
        }

        let assembler = self
            .assemblers
            .entry(timestamp)
            .or_insert_with(|| PartialFrame::new(timestamp, now));

        assembler.packets.insert(sequence, payload);

        // The first packet of the frame is the smallest sequence seen for it.
        if !assembler.has_first || seq_delta(sequence, assembler.first_sequence) < 0 {
            assembler.first_sequence = sequence;
            assembler.has_first = true;
        }
        // The marker bit closes the frame.
        if marker {
            assembler.last_sequence = sequence;
            assembler.has_last = true;
        }
        if is_keyframe_packet {
            assembler.is_keyframe = true;
        }

        if assembler.is_complete() {
            let assembler = self.assemblers.remove(&timestamp).unwrap();

            if self.config.wait_for_keyframe && !self.has_keyframe && !assembler.is_keyframe {
                // Cannot decode a delta frame without a reference.
                self.stats.frames_dropped += 1;
            } else {
                if assembler.is_keyframe {
                    self.has_keyframe = true;
                }
                self.complete_frames.push_back(assembler.assemble());
                self.stats.frames_assembled += 1;
            }
        }

        self.cleanup(now);
    }

    /// Removes and returns the oldest complete frame once it has aged past
    /// the target delay.
    pub fn pop_frame(&mut self) -> Option<BufferedFrame> {
        self.pop_frame_at(Instant::now())
    }

    pub fn pop_frame_at(&mut self, now: Instant) -> Option<BufferedFrame> {
        let age = now.checked_duration_since(self.complete_frames.front()?.arrival_time)?;
        if age < self.config.target_delay {
            return None;
        }
        self.stats.frames_popped += 1;
        self.complete_frames.pop_front()
    }

    pub fn peek_frame(&self) -> Option<&BufferedFrame> {
        self.complete_frames.front()
    }

    pub fn has_complete_frame(&self) -> bool {
        !self.complete_frames.is_empty()
    }

    /// Missing sequences within the NACK window below the highest received
    /// sequence, capped at `max_count`.
    pub fn nack_list(&self, max_count: usize) -> Vec<u16> {
        let mut nacks = vec![];
        if !self.highest_initialized {
            return nacks;
        }

        let start = self.highest_sequence.wrapping_sub(NACK_WINDOW);
        let mut seq = start;
        while seq != self.highest_sequence && nacks.len() < max_count {
            if !self.received_sequences.contains(&seq) {
                nacks.push(seq);
            }
            seq = seq.wrapping_add(1);
        }
        nacks
    }

    /// The receive pipeline relays this to the publisher as PLI/FIR.
    pub fn should_request_keyframe(&self) -> bool {
        !self.has_keyframe || self.stats.frames_dropped > KEYFRAME_REQUEST_DROP_THRESHOLD
    }

    pub fn stats(&self) -> FrameAssemblerStats {
        self.stats
    }

    pub fn reset(&mut self) {
        self.assemblers.clear();
        self.complete_frames.clear();
        self.received_sequences.clear();
        self.highest_initialized = false;
        self.has_keyframe = false;
        self.stats = FrameAssemblerStats::default();
    }

    /// Abandons stale state: complete frames nobody popped within
    /// `max_delay` and partial frames stuck longer than `2 * max_delay`.
    fn cleanup(&mut self, now: Instant) {
        while let Some(front) = self.complete_frames.front() {
            let expired = now
                .checked_duration_since(front.arrival_time)
                .map_or(false, |age| age > self.config.max_delay);
            if expired {
                self.complete_frames.pop_front();
                self.stats.frames_dropped += 1;
            } else {
                break;
            }
        }

        let deadline = self.config.max_delay * 2;
        let before = self.assemblers.len();
        self.assemblers.retain(|_, a| {
            now.checked_duration_since(a.first_arrival)
                .map_or(true, |age| age <= deadline)
        });
        self.stats.frames_dropped += (before - self.assemblers.len()) as u64;
    }
}
