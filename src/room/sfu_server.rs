
use std::net::IpAddr;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use rtcp::packet::Packet;
use rtcp::payload_feedbacks::full_intra_request::FullIntraRequest;
use rtcp::payload_feedbacks::picture_loss_indication::PictureLossIndication;
use rtcp::payload_feedbacks::receiver_estimated_maximum_bitrate::ReceiverEstimatedMaximumBitrate;
use rtcp::receiver_report::ReceiverReport;

use super::room_manager::RoomManager;
use super::{ParticipantId, StreamId};
use crate::error::{Error, Result};
use crate::sfu::{
    BandwidthInfo, ForwardingRule, RtpForwarder, RtpStreamInfo, SimulcastLayerInfo,
    SubscriptionManager,
};
use crate::transport::PortAllocator;

/// Asks the named publisher for a keyframe (PLI/FIR arrived for one of its
/// streams).
pub type KeyframeRequestCallback = Box<dyn Fn(&ParticipantId) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct SfuServerConfig {
    pub bind_ip: IpAddr,
    pub media_port_range: Range<u16>,
}

impl Default for SfuServerConfig {
    fn default() -> Self {
        SfuServerConfig {
            bind_ip: "0.0.0.0".parse().unwrap(),
            media_port_range: 10000..11000,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SfuServerStats {
    pub packets_forwarded: u64,
    pub packets_dropped: u64,
    pub active_publishers: usize,
    pub active_subscribers: usize,
    pub subscriptions: usize,
    pub ports_in_use: usize,
}

/// The SFU boundary object: owns the forwarder, the subscription manager,
/// the room registry and the media port pool, and wires bandwidth feedback
/// into layer selection.
pub struct SfuServer {
    config: SfuServerConfig,
    rooms: RoomManager,
    forwarder: Arc<RtpForwarder>,
    subscriptions: Arc<SubscriptionManager>,
    ports: PortAllocator,
    running: AtomicBool,
    keyframe_request_callback: Mutex<Option<KeyframeRequestCallback>>,
}

impl SfuServer {
    pub fn new(config: SfuServerConfig) -> Result<Self> {
        if config.media_port_range.is_empty() {
            return Err(Error::ErrInvalidConfig("empty media port range".into()));
        }

        let forwarder = Arc::new(RtpForwarder::new());
        let subscriptions = Arc::new(SubscriptionManager::new());

        // Automatic layer switches steer the forwarder's per-rule filter.
        let forwarder_for_switch = Arc::clone(&forwarder);
        subscriptions.set_layer_switch_callback(Box::new(
            move |subscriber, publisher, old, new| {
                log::info!(
                    "sfu: {subscriber} switches {publisher} layer {old} -> {new}"
                );
                forwarder_for_switch.set_simulcast_layer(publisher, subscriber, new);
            },
        ));

        Ok(SfuServer {
            ports: PortAllocator::new(config.bind_ip, config.media_port_range.clone()),
            config,
            rooms: RoomManager::new(),
            forwarder,
            subscriptions,
            running: AtomicBool::new(false),
            keyframe_request_callback: Mutex::new(None),
        })
    }

    pub fn set_keyframe_request_callback(&self, callback: KeyframeRequestCallback) {
        *self.keyframe_request_callback.lock().unwrap() = Some(callback);
    }

    pub fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
        log::info!(
            "sfu: serving on {} ports {:?}",
            self.config.bind_ip,
            self.config.media_port_range
        );
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn rooms(&self) -> &RoomManager {
        &self.rooms
    }

    pub fn forwarder(&self) -> &RtpForwarder {
        &self.forwarder
    }

    pub fn subscriptions(&self) -> &SubscriptionManager {
        &self.subscriptions
    }

    pub fn ports(&self) -> &PortAllocator {
        &self.ports
    }

    /// Registers a publisher stream with the forwarder, announcing its
    /// simulcast ladder when one is provided.
    pub fn add_publisher_stream(
        &self,
        publisher_id: &ParticipantId,
        stream_id: &StreamId,
        info: RtpStreamInfo,
        layers: Vec<SimulcastLayerInfo>,
    ) {
        self.forwarder.add_publisher(publisher_id, stream_id, info);
        if !layers.is_empty() {
            self.subscriptions
                .set_available_layers(publisher_id, stream_id, layers);
        }
    }

    pub fn remove_publisher_stream(&self, publisher_id: &ParticipantId, stream_id: &StreamId) {
        self.forwarder.remove_publisher(publisher_id, stream_id);
    }

    /// Creates a subscription in both the forwarder and the layer manager.
    pub fn subscribe(
        &self,
        subscriber_id: &ParticipantId,
        publisher_id: &ParticipantId,
        stream_id: &StreamId,
        rule: ForwardingRule,
    ) {
        let target_layer = rule.preferred_layer;
        self.forwarder
            .add_subscription(publisher_id, subscriber_id, rule);
        self.subscriptions
            .subscribe(subscriber_id, publisher_id, stream_id, target_layer);
    }

    pub fn unsubscribe(&self, subscriber_id: &ParticipantId, publisher_id: &ParticipantId) {
        self.forwarder.remove_subscription(publisher_id, subscriber_id);
        self.subscriptions.unsubscribe(subscriber_id, publisher_id);
    }

    /// REMB + loss + RTT feedback from a subscriber, closing the congestion
    /// loop into layer selection.
    pub fn on_receiver_feedback(
        &self,
        subscriber_id: &ParticipantId,
        estimated_bps: u64,
        packet_loss: f32,
        rtt_ms: f32,
    ) {
        self.subscriptions.update_bandwidth(
            subscriber_id,
            BandwidthInfo {
                estimated_bps,
                packet_loss,
                rtt_ms,
            },
        );
    }

    /// One RTCP compound from a subscriber. REMB feeds the bandwidth table,
    /// receiver-report loss/RTT refine it, and PLI/FIR are relayed to the
    /// originating publisher as keyframe requests. A malformed buffer is
    /// dropped and counted, never fatal.
    pub fn on_rtcp(&self, subscriber_id: &ParticipantId, data: &[u8]) {
        let mut buf = data;
        let packets = match rtcp::packet::unmarshal(&mut buf) {
            Ok(p) => p,
            Err(err) => {
                log::debug!("sfu: malformed RTCP from {subscriber_id}: {err}");
                return;
            }
        };

        for packet in packets {
            let any = packet.as_any();

            if let Some(remb) = any.downcast_ref::<ReceiverEstimatedMaximumBitrate>() {
                let mut info = self
                    .subscriptions
                    .bandwidth_of(subscriber_id)
                    .unwrap_or_default();
                info.estimated_bps = remb.bitrate;
                self.subscriptions.update_bandwidth(subscriber_id, info);
            } else if let Some(rr) = any.downcast_ref::<ReceiverReport>() {
                if let Some(report) = rr.reports.first() {
                    let mut info = self
                        .subscriptions
                        .bandwidth_of(subscriber_id)
                        .unwrap_or_default();
                    info.packet_loss = report.fraction_lost as f32 / 256.0;
                    self.subscriptions.update_bandwidth(subscriber_id, info);
                }
            } else if let Some(pli) = any.downcast_ref::<PictureLossIndication>() {
                self.request_keyframe_for_ssrc(pli.media_ssrc);
            } else if let Some(fir) = any.downcast_ref::<FullIntraRequest>() {
                for entry in &fir.fir {
                    self.request_keyframe_for_ssrc(entry.ssrc);
                }
            }
        }
    }

    fn request_keyframe_for_ssrc(&self, ssrc: u32) {
        let Some(publisher) = self.forwarder.publisher_of_ssrc(ssrc) else {
            return;
        };
        let cb = self.keyframe_request_callback.lock().unwrap();
        if let Some(cb) = &*cb {
            cb(&publisher);
        }
    }

    /// Periodic driver: re-evaluates simulcast layer selection.
    pub fn process(&self) {
        self.subscriptions.process();
    }

    pub fn stats(&self) -> SfuServerStats {
        let f = self.forwarder.stats();
        SfuServerStats {
            packets_forwarded: f.packets_forwarded,
            packets_dropped: f.packets_dropped,
            active_publishers: f.active_publishers,
            active_subscribers: f.active_subscribers,
            subscriptions: self.subscriptions.subscription_count(),
            ports_in_use: self.ports.in_use_count(),
        }
    }
}
