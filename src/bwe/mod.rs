
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Fired with the new estimate whenever it changes; consumers push it into
/// the encoder and the pacer.
pub type BitrateCallback = Box<dyn Fn(u64) + Send + Sync>;

type SharedBitrateCallback = Arc<dyn Fn(u64) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct BitrateControllerConfig {
    pub start_bitrate_bps: u64,
    pub min_bitrate_bps: u64,
    pub max_bitrate_bps: u64,
    /// Multiplicative increase per update period.
    pub increase_rate: f64,
    /// Backoff applied when loss crosses the threshold.
    pub decrease_rate: f64,
    /// Loss rate that counts as congestion.
    pub loss_threshold: f32,
    /// Minimum spacing between updates.
    pub update_interval: Duration,
}

impl Default for BitrateControllerConfig {
    fn default() -> Self {
        BitrateControllerConfig {
            start_bitrate_bps: 1_000_000,
            min_bitrate_bps: 100_000,
            max_bitrate_bps: 5_000_000,
            increase_rate: 1.08,
            decrease_rate: 0.85,
            loss_threshold: 0.02,
            update_interval: Duration::from_millis(25),
        }
    }
}

/// Snapshot of the controller's view of the channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct BitrateEstimate {
    pub estimated_bitrate_bps: u64,
    pub target_bitrate_bps: u64,
    pub packet_loss: f32,
    pub rtt_ms: f32,
    pub is_overusing: bool,
    pub is_underusing: bool,
}

struct ControllerInner {
    current_bitrate: u64,
    /// Receiver-estimated ceiling from REMB.
    target_bitrate: u64,
    loss: f32,
    rtt_ms: f32,
    overusing: bool,
    last_update: Instant,
    bytes_sent_since_update: u64,
    callback: Option<SharedBitrateCallback>,
}

/// Loss-based bitrate controller in the Google Congestion Control family:
/// multiplicative decrease on loss, slow recovery, multiplicative probe
/// upward otherwise, with the REMB value as a hard ceiling.
pub struct BitrateController {
    config: BitrateControllerConfig,
    inner: Mutex<ControllerInner>,
}

impl BitrateController {
    pub fn new(config: BitrateControllerConfig) -> Self {
        let inner = ControllerInner {
            current_bitrate: config.start_bitrate_bps,
            target_bitrate: config.start_bitrate_bps,
            loss: 0.0,
            rtt_ms: 0.0,
            overusing: false,
            last_update: Instant::now(),
            bytes_sent_since_update: 0,
            callback: None,
        };
        BitrateController {
            config,
            inner: Mutex::new(inner),
        }
    }

    pub fn set_callback(&self, callback: BitrateCallback) {
        self.inner.lock().unwrap().callback = Some(Arc::from(callback));
    }

    /// REMB feedback: the ceiling moves, and the estimate is clamped under
    /// it immediately.
    pub fn on_remb(&self, bitrate_bps: u64) {
        let (changed, callback) = {
            let mut inner = self.inner.lock().unwrap();
            inner.target_bitrate = bitrate_bps;
            let clamped = inner.current_bitrate.min(bitrate_bps);
            let changed = (clamped != inner.current_bitrate).then_some(clamped);
            if let Some(c) = changed {
                inner.current_bitrate = c;
            }
            (changed, inner.callback.clone())
        };

        if let (Some(bps), Some(cb)) = (changed, callback) {
            cb(bps);
        }
    }

    pub fn on_packet_loss(&self, loss_rate: f32) {
        self.inner.lock().unwrap().loss = loss_rate;
    }

    pub fn on_rtt(&self, rtt_ms: f32) {
        self.inner.lock().unwrap().rtt_ms = rtt_ms;
    }

    pub fn on_packet_sent(&self, size_bytes: usize) {
        self.inner.lock().unwrap().bytes_sent_since_update += size_bytes as u64;
    }

    /// Periodic driver; applies the update rule at most once per
    /// `update_interval`.
    pub fn process(&self) {
        self.process_at(Instant::now())
    }

    pub fn process_at(&self, now: Instant) {
        let (changed, callback) = {
            let mut inner = self.inner.lock().unwrap();
            if now.saturating_duration_since(inner.last_update) < self.config.update_interval {
                return;
            }
            inner.last_update = now;
            inner.bytes_sent_since_update = 0;

            let changed = self.update_bitrate(&mut inner);
            (changed, inner.callback.clone())
        };

        if let (Some(bps), Some(cb)) = (changed, callback) {
            cb(bps);
        }
    }

    fn update_bitrate(&self, inner: &mut ControllerInner) -> Option<u64> {
        let current = inner.current_bitrate as f64;

        let scaled = if inner.loss > self.config.loss_threshold {
            inner.overusing = true;
            current * self.config.decrease_rate
        } else if inner.overusing {
            if inner.loss < 0.005 {
                // Loss cleared: leave the overuse regime and resume probing.
                inner.overusing = false;
                current * self.config.increase_rate
            } else {
                // Residual loss: creep upward.
                current * 1.02
            }
        } else {
            current * self.config.increase_rate
        };
        let mut new_bitrate = scaled as u64;

        new_bitrate = new_bitrate.clamp(self.config.min_bitrate_bps, self.config.max_bitrate_bps);
        // The receiver's REMB estimate is a hard ceiling on every tick.
        new_bitrate = new_bitrate.min(inner.target_bitrate);

        if new_bitrate != inner.current_bitrate {
            inner.current_bitrate = new_bitrate;
            Some(new_bitrate)
        } else {
            None
        }
    }

    pub fn estimate(&self) -> BitrateEstimate {
        let inner = self.inner.lock().unwrap();
        BitrateEstimate {
            estimated_bitrate_bps: inner.current_bitrate,
            target_bitrate_bps: inner.target_bitrate,
            packet_loss: inner.loss,
            rtt_ms: inner.rtt_ms,
            is_overusing: inner.overusing,
            is_underusing: (inner.current_bitrate as f64) < inner.target_bitrate as f64 * 0.8,
        }
    }

    pub fn current_bitrate(&self) -> u64 {
        self.inner.lock().unwrap().current_bitrate
    }

    /// Forces a bitrate, clamped to the configured bounds.
    pub fn set_bitrate(&self, bitrate_bps: u64) {
        let mut inner = self.inner.lock().unwrap();
        inner.current_bitrate =
            bitrate_bps.clamp(self.config.min_bitrate_bps, self.config.max_bitrate_bps);
    }
}

/// One simulcast encoding, low to high.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulcastLayer {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub bitrate_kbps: u32,
    pub active: bool,
}

/// Builds the conventional three-layer ladder: full resolution at 60% of the
/// budget, half at 30%, quarter (half frame rate) at 10%.
pub fn default_simulcast_layers(
    width: u32,
    height: u32,
    max_bitrate_kbps: u32,
) -> Vec<SimulcastLayer> {
    vec![
        SimulcastLayer {
            width: width / 4,
            height: height / 4,
            fps: 15,
            bitrate_kbps: max_bitrate_kbps * 10 / 100,
            active: true,
        },
        SimulcastLayer {
            width: width / 2,
            height: height / 2,
            fps: 30,
            bitrate_kbps: max_bitrate_kbps * 30 / 100,
            active: true,
        },
        SimulcastLayer {
            width,
            height,
            fps: 30,
            bitrate_kbps: max_bitrate_kbps * 60 / 100,
            active: true,
        },
    ]
}

/// Picks the layers that fit in the available budget, greedily from the
/// highest. At least the lowest layer is always kept.
pub fn select_simulcast_layers(
    layers: &[SimulcastLayer],
    available_bitrate_kbps: u32,
) -> Vec<SimulcastLayer> {
    let mut active = vec![];
    let mut remaining = available_bitrate_kbps;

    for layer in layers.iter().rev() {
        if layer.bitrate_kbps <= remaining {
            active.push(*layer);
            remaining -= layer.bitrate_kbps;
        }
    }

    if active.is_empty() {
        if let Some(lowest) = layers.first() {
            active.push(*lowest);
        }
    }

    active
}
