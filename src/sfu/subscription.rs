#[cfg(test)]
mod subscription_test;

use std::collections::HashMap;
use std::sync::Mutex;

use super::{ParticipantId, StreamId};

/// One rung of a publisher's simulcast ladder as announced to subscribers.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulcastLayerInfo {
    /// 0 = low, 1 = mid, 2 = high.
    pub layer_index: i32,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub bitrate_kbps: u32,
    pub is_active: bool,
}

/// A subscriber's interest in one published stream.
#[derive(Debug, Clone, Default)]
pub struct Subscription {
    pub publisher_id: ParticipantId,
    pub stream_id: StreamId,
    /// -1 auto-selects from bandwidth; >= 0 pins the layer.
    pub target_layer: i32,
    pub current_layer: i32,
    pub is_paused: bool,
    pub bytes_received: u64,
}

/// Subscriber bandwidth as learned from REMB and receiver reports.
#[derive(Debug, Clone, Copy, Default)]
pub struct BandwidthInfo {
    pub estimated_bps: u64,
    pub packet_loss: f32,
    pub rtt_ms: f32,
}

/// `(subscriber, publisher, old_layer, new_layer)` on every automatic
/// switch.
pub type LayerSwitchCallback =
    Box<dyn Fn(&ParticipantId, &ParticipantId, i32, i32) + Send + Sync>;

#[derive(Hash, PartialEq, Eq, Clone)]
struct SubscriptionKey {
    subscriber_id: ParticipantId,
    publisher_id: ParticipantId,
}

#[derive(Hash, PartialEq, Eq, Clone)]
struct StreamKey {
    publisher_id: ParticipantId,
    stream_id: StreamId,
}

struct ManagerInner {
    layer_switch_callback: Option<LayerSwitchCallback>,
    stream_layers: HashMap<StreamKey, Vec<SimulcastLayerInfo>>,
    subscriptions: HashMap<SubscriptionKey, Subscription>,
    bandwidth_info: HashMap<ParticipantId, BandwidthInfo>,
}

/// Tracks who receives which stream at which simulcast layer, and steers
/// the layer per subscriber from bandwidth feedback.
pub struct SubscriptionManager {
    inner: Mutex<ManagerInner>,
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionManager {
    pub fn new() -> Self {
        SubscriptionManager {
            inner: Mutex::new(ManagerInner {
                layer_switch_callback: None,
                stream_layers: HashMap::new(),
                subscriptions: HashMap::new(),
                bandwidth_info: HashMap::new(),
            }),
        }
    }

    pub fn set_layer_switch_callback(&self, callback: LayerSwitchCallback) {
        self.inner.lock().unwrap().layer_switch_callback = Some(callback);
    }

    pub fn set_available_layers(
        &self,
        publisher_id: &ParticipantId,
        stream_id: &StreamId,
        layers: Vec<SimulcastLayerInfo>,
    ) {
        let mut inner = self.inner.lock().unwrap();
        inner.stream_layers.insert(
            StreamKey {
                publisher_id: publisher_id.clone(),
                stream_id: stream_id.clone(),
            },
            layers,
        );
    }

    pub fn subscribe(
        &self,
        subscriber_id: &ParticipantId,
        publisher_id: &ParticipantId,
        stream_id: &StreamId,
        target_layer: i32,
    ) {
        let mut inner = self.inner.lock().unwrap();
        inner.subscriptions.insert(
            SubscriptionKey {
                subscriber_id: subscriber_id.clone(),
                publisher_id: publisher_id.clone(),
            },
            Subscription {
                publisher_id: publisher_id.clone(),
                stream_id: stream_id.clone(),
                target_layer,
                current_layer: if target_layer >= 0 { target_layer } else { 0 },
                is_paused: false,
                bytes_received: 0,
            },
        );
    }

    pub fn unsubscribe(&self, subscriber_id: &ParticipantId, publisher_id: &ParticipantId) {
        let mut inner = self.inner.lock().unwrap();
        inner.subscriptions.remove(&SubscriptionKey {
            subscriber_id: subscriber_id.clone(),
            publisher_id: publisher_id.clone(),
        });
    }

    pub fn set_paused(
        &self,
        subscriber_id: &ParticipantId,
        publisher_id: &ParticipantId,
        paused: bool,
    ) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(sub) = inner.subscriptions.get_mut(&SubscriptionKey {
            subscriber_id: subscriber_id.clone(),
            publisher_id: publisher_id.clone(),
        }) {
            sub.is_paused = paused;
        }
    }

    /// Pins (>= 0) or releases (-1) the layer for one subscription.
    pub fn set_target_layer(
        &self,
        subscriber_id: &ParticipantId,
        publisher_id: &ParticipantId,
        layer: i32,
    ) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(sub) = inner.subscriptions.get_mut(&SubscriptionKey {
            subscriber_id: subscriber_id.clone(),
            publisher_id: publisher_id.clone(),
        }) {
            sub.target_layer = layer;
            if layer >= 0 {
                sub.current_layer = layer;
            }
        }
    }

    /// REMB/receiver-report feedback for one subscriber.
    pub fn update_bandwidth(&self, subscriber_id: &ParticipantId, info: BandwidthInfo) {
        let mut inner = self.inner.lock().unwrap();
        inner.bandwidth_info.insert(subscriber_id.clone(), info);
    }

    pub fn bandwidth_of(&self, subscriber_id: &ParticipantId) -> Option<BandwidthInfo> {
        let inner = self.inner.lock().unwrap();
        inner.bandwidth_info.get(subscriber_id).copied()
    }

    /// Re-evaluates every auto-steered subscription; fires the layer-switch
    /// callback for each change. Call periodically.
    pub fn process(&self) {
        let mut switches: Vec<(ParticipantId, ParticipantId, i32, i32)> = vec![];

        {
            let mut inner = self.inner.lock().unwrap();
            let inner = &mut *inner;

            for (key, sub) in inner.subscriptions.iter_mut() {
                if sub.target_layer >= 0 || sub.is_paused {
                    continue;
                }

                let best = select_best_layer(
                    &inner.bandwidth_info,
                    &inner.stream_layers,
                    &key.subscriber_id,
                    &StreamKey {
                        publisher_id: sub.publisher_id.clone(),
                        stream_id: sub.stream_id.clone(),
                    },
                );

                if best != sub.current_layer {
                    switches.push((
                        key.subscriber_id.clone(),
                        key.publisher_id.clone(),
                        sub.current_layer,
                        best,
                    ));
                    sub.current_layer = best;
                }
            }
        }

        let inner = self.inner.lock().unwrap();
        if let Some(cb) = &inner.layer_switch_callback {
            for (subscriber, publisher, old, new) in &switches {
                cb(subscriber, publisher, *old, *new);
            }
        }
    }

    pub fn current_layer(
        &self,
        subscriber_id: &ParticipantId,
        publisher_id: &ParticipantId,
    ) -> Option<i32> {
        let inner = self.inner.lock().unwrap();
        inner
            .subscriptions
            .get(&SubscriptionKey {
                subscriber_id: subscriber_id.clone(),
                publisher_id: publisher_id.clone(),
            })
            .map(|s| s.current_layer)
    }

    pub fn subscriptions_for(&self, subscriber_id: &ParticipantId) -> Vec<Subscription> {
        let inner = self.inner.lock().unwrap();
        inner
            .subscriptions
            .iter()
            .filter(|(k, _)| &k.subscriber_id == subscriber_id)
            .map(|(_, s)| s.clone())
            .collect()
    }

    pub fn subscription_count(&self) -> usize {
        self.inner.lock().unwrap().subscriptions.len()
    }
}

/// The highest active layer whose advertised bitrate fits the subscriber's
/// estimate; layer 0 when nothing fits, the highest registered active layer
/// when no bandwidth info exists yet.
fn select_best_layer(
    bandwidth_info: &HashMap<ParticipantId, BandwidthInfo>,
    stream_layers: &HashMap<StreamKey, Vec<SimulcastLayerInfo>>,
    subscriber_id: &ParticipantId,
    stream_key: &StreamKey,
) -> i32 {
    let Some(layers) = stream_layers.get(stream_key) else {
        return 0;
    };

    let Some(bw) = bandwidth_info.get(subscriber_id) else {
        // No feedback yet: default to the best layer the publisher
        // actually announces.
        return layers
            .iter()
            .filter(|l| l.is_active)
            .map(|l| l.layer_index)
            .max()
            .unwrap_or(0);
    };

    let mut best = 0;
    for layer in layers {
        if layer.is_active && (layer.bitrate_kbps as u64) * 1000 <= bw.estimated_bps {
            best = layer.layer_index;
        }
    }
    best
}
