
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::error::{Error, Result};

/// Priorities for the send queue. Audio preempts video; FEC yields to both.
pub const PRIORITY_AUDIO: i32 = 10;
pub const PRIORITY_VIDEO: i32 = 5;
pub const PRIORITY_FEC: i32 = 1;

pub type PacerSendCallback = Box<dyn Fn(&Bytes, SocketAddr) + Send + Sync>;

type SharedSendCallback = std::sync::Arc<dyn Fn(&Bytes, SocketAddr) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct PacerConfig {
    pub target_bitrate_bps: u64,
    /// Token bucket capacity: the largest burst one tick may emit.
    pub bucket_capacity_bytes: usize,
    pub max_queue_size: usize,
    /// How often `process()` is expected to run.
    pub pacing_interval: Duration,
}

impl Default for PacerConfig {
    fn default() -> Self {
        PacerConfig {
            target_bitrate_bps: 1_000_000,
            bucket_capacity_bytes: 10_000,
            max_queue_size: 1000,
            pacing_interval: Duration::from_millis(5),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PacerStats {
    pub packets_sent: u64,
    pub bytes_sent: u64,
    pub packets_dropped: u64,
    /// Mean time sent packets spent queued waiting for tokens.
    pub avg_queue_delay: Duration,
}

struct QueuedPacket {
    data: Bytes,
    destination: SocketAddr,
    priority: i32,
    enqueue_time: Instant,
    /// Tie-breaker: earlier packets first within one priority.
    order: u64,
}

impl PartialEq for QueuedPacket {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.order == other.order
    }
}
impl Eq for QueuedPacket {}

impl PartialOrd for QueuedPacket {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedPacket {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Max-heap: higher priority first, then lower order (FIFO).
        self.priority
            .cmp(&other.priority)
            .then(other.order.cmp(&self.order))
    }
}

struct PacerInner {
    target_bitrate_bps: u64,
    available_tokens: f64,
    last_process: Instant,
    queue: BinaryHeap<QueuedPacket>,
    next_order: u64,
    send_callback: Option<SharedSendCallback>,
    /// Sum of per-packet queueing delay, for the running average.
    total_queue_delay: Duration,
    stats: PacerStats,
}

/// Token-bucket RTP pacer: smooths outgoing bursts to the target bitrate.
///
/// Tokens are bytes. Each `process()` refills `rate/8 · Δt` tokens (capped at
/// the bucket capacity) and drains the queue in priority order while the
/// head packet is fully paid for. An unpaid head blocks the queue: a smaller
/// later packet never jumps ahead of it.
pub struct RtpPacer {
    config: PacerConfig,
    inner: Mutex<PacerInner>,
}

impl RtpPacer {
    pub fn new(config: PacerConfig) -> Self {
        let inner = PacerInner {
            target_bitrate_bps: config.target_bitrate_bps,
            available_tokens: config.bucket_capacity_bytes as f64,
            last_process: Instant::now(),
            queue: BinaryHeap::new(),
            next_order: 0,
            send_callback: None,
            total_queue_delay: Duration::ZERO,
            stats: PacerStats::default(),
        };
        RtpPacer {
            config,
            inner: Mutex::new(inner),
        }
    }

    pub fn set_send_callback(&self, callback: PacerSendCallback) {
        self.inner.lock().unwrap().send_callback = Some(std::sync::Arc::from(callback));
    }

    /// Queues a packet. A full queue rejects the packet and counts the drop.
    pub fn enqueue(&self, data: Bytes, destination: SocketAddr, priority: i32) -> Result<()> {
        self.enqueue_at(data, destination, priority, Instant::now())
    }

    pub fn enqueue_at(
        &self,
        data: Bytes,
        destination: SocketAddr,
        priority: i32,
        now: Instant,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.queue.len() >= self.config.max_queue_size {
            inner.stats.packets_dropped += 1;
            return Err(Error::ErrQueueFull);
        }

        let order = inner.next_order;
        inner.next_order += 1;
        inner.queue.push(QueuedPacket {
            data,
            destination,
            priority,
            enqueue_time: now,
            order,
        });
        Ok(())
    }

    /// Refills tokens and sends every packet the bucket can pay for.
    /// Returns the number of packets sent.
    pub fn process(&self) -> usize {
        self.process_at(Instant::now())
    }

    pub fn process_at(&self, now: Instant) -> usize {
        let mut to_send: Vec<(Bytes, SocketAddr)> = vec![];

        let callback = {
            let mut inner = self.inner.lock().unwrap();

            let elapsed = now
                .checked_duration_since(inner.last_process)
                .unwrap_or(Duration::ZERO);
            inner.last_process = now;

            let refill = (inner.target_bitrate_bps as f64 / 8.0) * elapsed.as_secs_f64();
            inner.available_tokens = (inner.available_tokens + refill)
                .min(self.config.bucket_capacity_bytes as f64);

            // A zero rate pauses the pacer outright.
            if inner.target_bitrate_bps == 0 {
                return 0;
            }

            while let Some(head) = inner.queue.peek() {
                if (head.data.len() as f64) > inner.available_tokens {
                    break; // wait for tokens; do not starve the head
                }
                let packet = inner.queue.pop().unwrap();
                inner.available_tokens -= packet.data.len() as f64;
                inner.stats.packets_sent += 1;
                inner.stats.bytes_sent += packet.data.len() as u64;
                inner.total_queue_delay += now.saturating_duration_since(packet.enqueue_time);
                to_send.push((packet.data, packet.destination));
            }
            if inner.stats.packets_sent > 0 {
                inner.stats.avg_queue_delay =
                    inner.total_queue_delay / inner.stats.packets_sent as u32;
            }

            inner.send_callback.clone()
        };

        // Deliver outside the lock so the callback may re-enqueue.
        if let Some(cb) = callback {
            for (data, dest) in &to_send {
                cb(data, *dest);
            }
        }

        to_send.len()
    }

    /// Updates the fill rate; takes effect on the next `process()`.
    pub fn set_target_bitrate(&self, bitrate_bps: u64) {
        self.inner.lock().unwrap().target_bitrate_bps = bitrate_bps;
    }

    pub fn target_bitrate(&self) -> u64 {
        self.inner.lock().unwrap().target_bitrate_bps
    }

    pub fn queue_size(&self) -> usize {
        self.inner.lock().unwrap().queue.len()
    }

    /// Age of the oldest queued packet.
    pub fn queue_delay(&self) -> Duration {
        self.queue_delay_at(Instant::now())
    }

    pub fn queue_delay_at(&self, now: Instant) -> Duration {
        let inner = self.inner.lock().unwrap();
        inner
            .queue
            .iter()
            .map(|p| now.saturating_duration_since(p.enqueue_time))
            .max()
            .unwrap_or(Duration::ZERO)
    }

    /// Empties the queue, e.g. when a track is removed.
    pub fn clear(&self) {
        self.inner.lock().unwrap().queue.clear();
    }

    pub fn stats(&self) -> PacerStats {
        self.inner.lock().unwrap().stats
    }
}
