use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, PartialEq)]
#[non_exhaustive]
pub enum Error {
    #[error("invalid configuration: {0}")]
    ErrInvalidConfig(String),
    #[error("component is closed")]
    ErrClosed,
    #[error("queue is full")]
    ErrQueueFull,
    #[error("no such participant")]
    ErrUnknownParticipant,
    #[error("no such room")]
    ErrUnknownRoom,
    #[error("room already exists")]
    ErrRoomExists,
    #[error("room is locked")]
    ErrRoomLocked,
    #[error("room is full")]
    ErrRoomFull,
    #[error("participant already joined")]
    ErrAlreadyJoined,
    #[error("no ports available in the configured range")]
    ErrPortRangeExhausted,

    #[error("{0}")]
    Ice(#[from] ice::Error),

    #[error("{0}")]
    Util(#[from] util::Error),

    #[error("{0}")]
    Other(String),
}
