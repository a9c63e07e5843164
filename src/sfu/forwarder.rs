#[cfg(test)]
mod forwarder_test;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;

use super::{ParticipantId, StreamId};

const SSRC_OFFSET: usize = 8;
const MIN_RTP_PACKET: usize = 12;

/// Static description of one published RTP stream.
#[derive(Debug, Clone)]
pub struct RtpStreamInfo {
    pub ssrc: u32,
    pub payload_type: u8,
    pub is_audio: bool,
    /// -1 when not simulcast, 0-2 for the layer this SSRC carries.
    pub simulcast_layer: i32,
    pub codec_name: String,
}

impl Default for RtpStreamInfo {
    fn default() -> Self {
        RtpStreamInfo {
            ssrc: 0,
            payload_type: 0,
            is_audio: false,
            simulcast_layer: -1,
            codec_name: String::new(),
        }
    }
}

/// What to do with a publisher's packets for one subscriber.
#[derive(Debug, Clone)]
pub struct ForwardingRule {
    pub subscriber_id: ParticipantId,
    pub destination: SocketAddr,
    /// 0 passes the publisher's SSRC through unchanged.
    pub rewritten_ssrc: u32,
    /// -1 lets the subscription manager steer; otherwise only packets of
    /// this simulcast layer are forwarded.
    pub preferred_layer: i32,
    pub active: bool,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ForwarderStats {
    pub packets_received: u64,
    pub packets_forwarded: u64,
    pub bytes_received: u64,
    pub bytes_forwarded: u64,
    pub packets_dropped: u64,
    pub active_publishers: usize,
    pub active_subscribers: usize,
}

/// `(subscriber, packet, destination)` for each forwarded packet.
pub type ForwardCallback = Box<dyn Fn(&ParticipantId, &[u8], SocketAddr) + Send + Sync>;

struct PublisherStream {
    publisher_id: ParticipantId,
    stream_id: StreamId,
    info: RtpStreamInfo,
    subscribers: Vec<ForwardingRule>,
}

struct ForwarderInner {
    forward_callback: Option<ForwardCallback>,
    ssrc_to_stream: HashMap<u32, PublisherStream>,
    publisher_ssrcs: HashMap<ParticipantId, Vec<u32>>,
    stats: ForwarderStats,
    /// Scratch for the SSRC-rewrite path; the pass-through path never
    /// copies.
    forward_buffer: Vec<u8>,
}

/// The SFU hot path: looks up the publisher stream by SSRC and fans the
/// packet out to every active subscription, rewriting the SSRC in a scratch
/// buffer only when a rule demands it.
pub struct RtpForwarder {
    inner: Mutex<ForwarderInner>,
}

impl Default for RtpForwarder {
    fn default() -> Self {
        Self::new()
    }
}

impl RtpForwarder {
    pub fn new() -> Self {
        RtpForwarder {
            inner: Mutex::new(ForwarderInner {
                forward_callback: None,
                ssrc_to_stream: HashMap::new(),
                publisher_ssrcs: HashMap::new(),
                stats: ForwarderStats::default(),
                forward_buffer: Vec::with_capacity(1500),
            }),
        }
    }

    pub fn set_forward_callback(&self, callback: ForwardCallback) {
        self.inner.lock().unwrap().forward_callback = Some(callback);
    }

    pub fn add_publisher(
        &self,
        publisher_id: &ParticipantId,
        stream_id: &StreamId,
        info: RtpStreamInfo,
    ) {
        let mut inner = self.inner.lock().unwrap();
        let ssrc = info.ssrc;

        inner.ssrc_to_stream.insert(
            ssrc,
            PublisherStream {
                publisher_id: publisher_id.clone(),
                stream_id: stream_id.clone(),
                info,
                subscribers: vec![],
            },
        );
        inner
            .publisher_ssrcs
            .entry(publisher_id.clone())
            .or_default()
            .push(ssrc);
        inner.stats.active_publishers = inner.publisher_ssrcs.len();
    }

    pub fn remove_publisher(&self, publisher_id: &ParticipantId, stream_id: &StreamId) {
        let mut inner = self.inner.lock().unwrap();

        let Some(ssrcs) = inner.publisher_ssrcs.get(publisher_id) else {
            return;
        };
        let matching: Vec<u32> = ssrcs
            .iter()
            .copied()
            .filter(|ssrc| {
                inner
                    .ssrc_to_stream
                    .get(ssrc)
                    .map_or(false, |s| &s.stream_id == stream_id)
            })
            .collect();

        for ssrc in &matching {
            inner.ssrc_to_stream.remove(ssrc);
        }
        if let Some(ssrcs) = inner.publisher_ssrcs.get_mut(publisher_id) {
            ssrcs.retain(|s| !matching.contains(s));
            if ssrcs.is_empty() {
                inner.publisher_ssrcs.remove(publisher_id);
            }
        }
        inner.stats.active_publishers = inner.publisher_ssrcs.len();
    }

    /// Attaches `rule` to every stream of `publisher_id`.
    pub fn add_subscription(
        &self,
        publisher_id: &ParticipantId,
        subscriber_id: &ParticipantId,
        mut rule: ForwardingRule,
    ) {
        let mut inner = self.inner.lock().unwrap();
        rule.subscriber_id = subscriber_id.clone();

        let Some(ssrcs) = inner.publisher_ssrcs.get(publisher_id).cloned() else {
            return;
        };
        for ssrc in ssrcs {
            if let Some(stream) = inner.ssrc_to_stream.get_mut(&ssrc) {
                stream.subscribers.push(rule.clone());
            }
        }
        inner.stats.active_subscribers += 1;
    }

    pub fn remove_subscription(
        &self,
        publisher_id: &ParticipantId,
        subscriber_id: &ParticipantId,
    ) {
        let mut inner = self.inner.lock().unwrap();

        let Some(ssrcs) = inner.publisher_ssrcs.get(publisher_id).cloned() else {
            return;
        };
        for ssrc in ssrcs {
            if let Some(stream) = inner.ssrc_to_stream.get_mut(&ssrc) {
                stream
                    .subscribers
                    .retain(|r| &r.subscriber_id != subscriber_id);
            }
        }
        inner.stats.active_subscribers = inner.stats.active_subscribers.saturating_sub(1);
    }

    /// Updates the preferred simulcast layer on a live subscription. The
    /// forwarder does not buffer across the switch: the new layer shows up
    /// with its next packet.
    pub fn set_simulcast_layer(
        &self,
        publisher_id: &ParticipantId,
        subscriber_id: &ParticipantId,
        layer: i32,
    ) {
        let mut inner = self.inner.lock().unwrap();

        let Some(ssrcs) = inner.publisher_ssrcs.get(publisher_id).cloned() else {
            return;
        };
        for ssrc in ssrcs {
            if let Some(stream) = inner.ssrc_to_stream.get_mut(&ssrc) {
                for rule in &mut stream.subscribers {
                    if &rule.subscriber_id == subscriber_id {
                        rule.preferred_layer = layer;
                    }
                }
            }
        }
    }

    /// The forward path. Holds the index lock for the duration of one
    /// fan-out.
    pub fn on_rtp_packet(&self, ssrc: u32, packet: &[u8], _source: SocketAddr) {
        let mut inner = self.inner.lock().unwrap();
        let inner = &mut *inner;

        inner.stats.packets_received += 1;
        inner.stats.bytes_received += packet.len() as u64;

        let Some(stream) = inner.ssrc_to_stream.get(&ssrc) else {
            inner.stats.packets_dropped += 1;
            return;
        };

        let Some(callback) = &inner.forward_callback else {
            return;
        };

        for rule in &stream.subscribers {
            if !rule.active {
                continue;
            }

            // Simulcast filter: a subscriber locked to a layer only gets
            // packets of that layer's SSRC.
            if rule.preferred_layer >= 0
                && stream.info.simulcast_layer >= 0
                && stream.info.simulcast_layer != rule.preferred_layer
            {
                continue;
            }

            if rule.rewritten_ssrc == 0 || rule.rewritten_ssrc == stream.info.ssrc {
                // Zero-copy pass-through of the original bytes.
                callback(&rule.subscriber_id, packet, rule.destination);
            } else if packet.len() >= MIN_RTP_PACKET {
                inner.forward_buffer.clear();
                inner.forward_buffer.extend_from_slice(packet);
                inner.forward_buffer[SSRC_OFFSET..SSRC_OFFSET + 4]
                    .copy_from_slice(&rule.rewritten_ssrc.to_be_bytes());
                callback(&rule.subscriber_id, &inner.forward_buffer, rule.destination);
            } else {
                continue;
            }

            inner.stats.packets_forwarded += 1;
            inner.stats.bytes_forwarded += packet.len() as u64;
        }
    }

    /// Resolves the publisher owning an SSRC (for routing RTCP feedback).
    pub fn publisher_of_ssrc(&self, ssrc: u32) -> Option<ParticipantId> {
        self.inner
            .lock()
            .unwrap()
            .ssrc_to_stream
            .get(&ssrc)
            .map(|s| s.publisher_id.clone())
    }

    pub fn stats(&self) -> ForwarderStats {
        self.inner.lock().unwrap().stats
    }

    pub fn publishers(&self) -> Vec<ParticipantId> {
        self.inner
            .lock()
            .unwrap()
            .publisher_ssrcs
            .keys()
            .cloned()
            .collect()
    }

    pub fn subscribers(&self, publisher_id: &ParticipantId) -> Vec<ParticipantId> {
        let inner = self.inner.lock().unwrap();
        let mut result: Vec<ParticipantId> = vec![];

        let Some(ssrcs) = inner.publisher_ssrcs.get(publisher_id) else {
            return result;
        };
        for ssrc in ssrcs {
            if let Some(stream) = inner.ssrc_to_stream.get(ssrc) {
                for rule in &stream.subscribers {
                    if !result.contains(&rule.subscriber_id) {
                        result.push(rule.subscriber_id.clone());
                    }
                }
            }
        }
        result
    }
}
