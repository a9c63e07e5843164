pub mod conference_bridge;
pub mod room_manager;
pub mod sfu_server;

pub use conference_bridge::{ConferenceBridge, ConferenceBridgeConfig};
pub use room_manager::{
    MediaState, Participant, ParticipantRole, Room, RoomConfig, RoomEvent, RoomEventCallback,
    RoomManager,
};
pub use sfu_server::{SfuServer, SfuServerConfig, SfuServerStats};

pub use crate::sfu::{ParticipantId, StreamId};

/// Room identifier.
pub type RoomId = String;
