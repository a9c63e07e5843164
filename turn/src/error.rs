use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, PartialEq)]
#[non_exhaustive]
pub enum Error {
    #[error("channel number not in [0x4000, 0x7FFE]")]
    ErrInvalidChannelNumber,
    #[error("channel data length mismatch")]
    ErrBadChannelDataLength,
    #[error("unexpected EOF")]
    ErrUnexpectedEof,
    #[error("all retransmissions failed")]
    ErrAllRetransmissionsFailed,
    #[error("no allocation exists")]
    ErrNoAllocation,
    #[error("allocation already exists")]
    ErrAllocationExists,
    #[error("transaction closed")]
    ErrTransactionClosed,
    #[error("unexpected STUN response type")]
    ErrUnexpectedResponse,
    #[error("server error: {0}")]
    ErrServer(String),
    #[error("fake transaction id mismatch")]
    ErrTransactionIdMismatch,

    #[error("{0}")]
    Stun(#[from] stun::Error),

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
