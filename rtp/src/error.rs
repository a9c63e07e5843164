use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, PartialEq)]
#[non_exhaustive]
pub enum Error {
    #[error("RTP header size insufficient")]
    ErrHeaderSizeInsufficient,
    #[error("RTP header size insufficient for extension")]
    ErrHeaderSizeInsufficientForExtension,
    #[error("buffer too small")]
    ErrBufferTooSmall,
    #[error("invalid RTP version")]
    ErrBadVersion,
    #[error("extension_payload must be in 32-bit words")]
    ErrExtensionPayloadNot32BitWords,
    #[error("padding length exceeds payload")]
    ErrBadPadding,
    #[error("packet is not large enough")]
    ErrShortPacket,
}

impl From<Error> for util::Error {
    fn from(e: Error) -> Self {
        util::Error::Other(e.to_string())
    }
}
