use std::sync::{Arc, Mutex as StdMutex};

use super::*;

#[test]
fn test_room_lifecycle_events() -> Result<()> {
    let mgr = RoomManager::new();
    let events = Arc::new(StdMutex::new(vec![]));
    let events2 = Arc::clone(&events);
    mgr.set_event_callback(Box::new(move |room, event, participant| {
        events2
            .lock()
            .unwrap()
            .push((room.clone(), event, participant.cloned()));
    }));

    let room = "meeting".to_owned();
    let alice = "alice".to_owned();

    mgr.create_room(&room, RoomConfig::default())?;
    mgr.join_room(&room, &alice, ParticipantRole::Host)?;
    mgr.leave_room(&room, &alice)?;
    mgr.close_room(&room)?;

    let events = events.lock().unwrap();
    assert_eq!(
        events
            .iter()
            .map(|(_, e, _)| *e)
            .collect::<Vec<_>>(),
        vec![
            RoomEvent::RoomCreated,
            RoomEvent::ParticipantJoined,
            RoomEvent::ParticipantLeft,
            RoomEvent::RoomClosed,
        ]
    );
    assert_eq!(events[1].2, Some(alice));
    Ok(())
}

#[test]
fn test_join_constraints() -> Result<()> {
    let mgr = RoomManager::new();
    let room = "small".to_owned();
    mgr.create_room(&room, RoomConfig { max_participants: 1 })?;

    mgr.join_room(&room, &"a".to_owned(), ParticipantRole::Speaker)?;

    // Capacity.
    assert_eq!(
        mgr.join_room(&room, &"b".to_owned(), ParticipantRole::Speaker),
        Err(Error::ErrRoomFull)
    );

    // Double join.
    assert_eq!(
        mgr.join_room(&room, &"a".to_owned(), ParticipantRole::Speaker),
        Err(Error::ErrAlreadyJoined)
    );

    // Unknown room.
    assert_eq!(
        mgr.join_room(&"nope".to_owned(), &"a".to_owned(), ParticipantRole::Viewer),
        Err(Error::ErrUnknownRoom)
    );
    Ok(())
}

#[test]
fn test_locked_room_rejects_joins() -> Result<()> {
    let mgr = RoomManager::new();
    let room = "locked".to_owned();
    mgr.create_room(&room, RoomConfig::default())?;
    mgr.set_room_locked(&room, true)?;

    assert_eq!(
        mgr.join_room(&room, &"a".to_owned(), ParticipantRole::Speaker),
        Err(Error::ErrRoomLocked)
    );

    mgr.set_room_locked(&room, false)?;
    mgr.join_room(&room, &"a".to_owned(), ParticipantRole::Speaker)?;
    Ok(())
}

#[test]
fn test_media_state_update() -> Result<()> {
    let mgr = RoomManager::new();
    let room = "media".to_owned();
    let id = "a".to_owned();
    mgr.create_room(&room, RoomConfig::default())?;
    mgr.join_room(&room, &id, ParticipantRole::Speaker)?;

    mgr.update_media_state(
        &room,
        &id,
        MediaState {
            audio_enabled: true,
            video_enabled: true,
            screen_sharing: false,
        },
    )?;

    let snapshot = mgr.room(&room).unwrap();
    assert!(snapshot.participants[&id].media.audio_enabled);
    Ok(())
}

#[test]
fn test_cleanup_closes_empty_rooms() -> Result<()> {
    let mgr = RoomManager::new();
    mgr.create_room(&"empty".to_owned(), RoomConfig::default())?;
    mgr.create_room(&"busy".to_owned(), RoomConfig::default())?;
    mgr.join_room(&"busy".to_owned(), &"a".to_owned(), ParticipantRole::Speaker)?;

    assert_eq!(mgr.cleanup(), 1);
    assert_eq!(mgr.room_ids(), vec!["busy".to_owned()]);
    Ok(())
}
