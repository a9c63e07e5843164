pub mod forwarder;
pub mod subscription;

pub use forwarder::{
    ForwardCallback, ForwarderStats, ForwardingRule, RtpForwarder, RtpStreamInfo,
};
pub use subscription::{
    BandwidthInfo, LayerSwitchCallback, SimulcastLayerInfo, Subscription, SubscriptionManager,
};

/// Participant identifier.
pub type ParticipantId = String;

/// Stream identifier (one participant may publish multiple streams).
pub type StreamId = String;
