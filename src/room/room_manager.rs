#[cfg(test)]
mod room_manager_test;

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use super::{ParticipantId, RoomId};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParticipantRole {
    Host,
    #[default]
    Speaker,
    Viewer,
}

/// What a participant is currently sending.
#[derive(Debug, Clone, Copy, Default)]
pub struct MediaState {
    pub audio_enabled: bool,
    pub video_enabled: bool,
    pub screen_sharing: bool,
}

#[derive(Debug, Clone)]
pub struct Participant {
    pub id: ParticipantId,
    pub role: ParticipantRole,
    pub media: MediaState,
    pub joined_at: Instant,
}

#[derive(Debug, Clone)]
pub struct RoomConfig {
    pub max_participants: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        RoomConfig {
            max_participants: 100,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Room {
    pub id: RoomId,
    pub config: RoomConfig,
    pub participants: HashMap<ParticipantId, Participant>,
    pub locked: bool,
    pub created_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomEvent {
    RoomCreated,
    RoomClosed,
    ParticipantJoined,
    ParticipantLeft,
    MediaStateChanged,
}

pub type RoomEventCallback =
    Box<dyn Fn(&RoomId, RoomEvent, Option<&ParticipantId>) + Send + Sync>;

/// Room lifecycle bookkeeping: who is in which room, with what role and
/// media state. Per-entity state is released in the same step the entity
/// leaves.
pub struct RoomManager {
    rooms: Mutex<HashMap<RoomId, Room>>,
    event_callback: Mutex<Option<RoomEventCallback>>,
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomManager {
    pub fn new() -> Self {
        RoomManager {
            rooms: Mutex::new(HashMap::new()),
            event_callback: Mutex::new(None),
        }
    }

    pub fn set_event_callback(&self, callback: RoomEventCallback) {
        *self.event_callback.lock().unwrap() = Some(callback);
    }

    fn emit(&self, room_id: &RoomId, event: RoomEvent, participant: Option<&ParticipantId>) {
        let cb = self.event_callback.lock().unwrap();
        if let Some(cb) = &*cb {
            cb(room_id, event, participant);
        }
    }

    pub fn create_room(&self, room_id: &RoomId, config: RoomConfig) -> Result<()> {
        {
            let mut rooms = self.rooms.lock().unwrap();
            if rooms.contains_key(room_id) {
                return Err(Error::ErrRoomExists);
            }
            rooms.insert(
                room_id.clone(),
                Room {
                    id: room_id.clone(),
                    config,
                    participants: HashMap::new(),
                    locked: false,
                    created_at: Instant::now(),
                },
            );
        }
        self.emit(room_id, RoomEvent::RoomCreated, None);
        Ok(())
    }

    pub fn close_room(&self, room_id: &RoomId) -> Result<()> {
        {
            let mut rooms = self.rooms.lock().unwrap();
            rooms.remove(room_id).ok_or(Error::ErrUnknownRoom)?;
        }
        self.emit(room_id, RoomEvent::RoomClosed, None);
        Ok(())
    }

    pub fn set_room_locked(&self, room_id: &RoomId, locked: bool) -> Result<()> {
        let mut rooms = self.rooms.lock().unwrap();
        let room = rooms.get_mut(room_id).ok_or(Error::ErrUnknownRoom)?;
        room.locked = locked;
        Ok(())
    }

    pub fn join_room(
        &self,
        room_id: &RoomId,
        participant_id: &ParticipantId,
        role: ParticipantRole,
    ) -> Result<()> {
        {
            let mut rooms = self.rooms.lock().unwrap();
            let room = rooms.get_mut(room_id).ok_or(Error::ErrUnknownRoom)?;

            if room.locked {
                return Err(Error::ErrRoomLocked);
            }
            if room.participants.len() >= room.config.max_participants {
                return Err(Error::ErrRoomFull);
            }
            if room.participants.contains_key(participant_id) {
                return Err(Error::ErrAlreadyJoined);
            }

            room.participants.insert(
                participant_id.clone(),
                Participant {
                    id: participant_id.clone(),
                    role,
                    media: MediaState::default(),
                    joined_at: Instant::now(),
                },
            );
        }
        self.emit(room_id, RoomEvent::ParticipantJoined, Some(participant_id));
        Ok(())
    }

    pub fn leave_room(&self, room_id: &RoomId, participant_id: &ParticipantId) -> Result<()> {
        {
            let mut rooms = self.rooms.lock().unwrap();
            let room = rooms.get_mut(room_id).ok_or(Error::ErrUnknownRoom)?;
            room.participants
                .remove(participant_id)
                .ok_or(Error::ErrUnknownParticipant)?;
        }
        self.emit(room_id, RoomEvent::ParticipantLeft, Some(participant_id));
        Ok(())
    }

    pub fn update_media_state(
        &self,
        room_id: &RoomId,
        participant_id: &ParticipantId,
        media: MediaState,
    ) -> Result<()> {
        {
            let mut rooms = self.rooms.lock().unwrap();
            let room = rooms.get_mut(room_id).ok_or(Error::ErrUnknownRoom)?;
            let participant = room
                .participants
                .get_mut(participant_id)
                .ok_or(Error::ErrUnknownParticipant)?;
            participant.media = media;
        }
        self.emit(room_id, RoomEvent::MediaStateChanged, Some(participant_id));
        Ok(())
    }

    pub fn room(&self, room_id: &RoomId) -> Option<Room> {
        self.rooms.lock().unwrap().get(room_id).cloned()
    }

    pub fn room_ids(&self) -> Vec<RoomId> {
        self.rooms.lock().unwrap().keys().cloned().collect()
    }

    pub fn participant_count(&self, room_id: &RoomId) -> usize {
        self.rooms
            .lock()
            .unwrap()
            .get(room_id)
            .map_or(0, |r| r.participants.len())
    }

    /// Removes rooms with no participants left. Returns how many were
    /// closed.
    pub fn cleanup(&self) -> usize {
        let removed: Vec<RoomId> = {
            let mut rooms = self.rooms.lock().unwrap();
            let empty: Vec<RoomId> = rooms
                .iter()
                .filter(|(_, r)| r.participants.is_empty())
                .map(|(id, _)| id.clone())
                .collect();
            for id in &empty {
                rooms.remove(id);
            }
            empty
        };

        for id in &removed {
            self.emit(id, RoomEvent::RoomClosed, None);
        }
        removed.len()
    }
}
