use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, PartialEq)]
#[non_exhaustive]
pub enum Error {
    #[error("the agent is closed")]
    ErrClosed,
    #[error("connection is not established")]
    ErrNotConnected,
    #[error("no candidate pairs available")]
    ErrNoCandidatePairs,
    #[error("remote credentials are not set")]
    ErrRemoteCredentials,
    #[error("local username fragment is less than 24 bits long")]
    ErrLocalUfragInsufficientBits,
    #[error("local password is less than 128 bits long")]
    ErrLocalPwdInsufficientBits,
    #[error("invalid SDP candidate attribute")]
    ErrBadCandidateAttribute,
    #[error("unknown candidate type")]
    ErrUnknownCandidateType,
    #[error("gathering is already in progress")]
    ErrGatheringInProgress,
    #[error("binding request integrity check failed")]
    ErrBindingIntegrity,

    #[error("{0}")]
    Stun(#[from] stun::Error),

    #[error("{0}")]
    Turn(#[from] turn::Error),

    #[error("{0}")]
    Util(#[from] util::Error),

    #[error("{0}")]
    Io(#[source] IoError),

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
#[error("io error: {0}")]
pub struct IoError(#[from] pub io::Error);

// Workaround for wanting PartialEq for io::Error.
impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(IoError(e))
    }
}
