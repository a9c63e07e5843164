use crate::attributes::AttrType;
use crate::error::{Error, Result};

/// Returns `ErrAttributeSizeInvalid` unless the attribute value has exactly
/// the expected size.
pub fn check_size(_at: AttrType, got: usize, expected: usize) -> Result<()> {
    if got == expected {
        Ok(())
    } else {
        Err(Error::ErrAttributeSizeInvalid)
    }
}

pub fn is_attr_size_invalid(err: &Error) -> bool {
    matches!(err, Error::ErrAttributeSizeInvalid)
}

/// Returns `ErrAttributeSizeOverflow` if the attribute value exceeds the
/// allowed maximum.
pub fn check_overflow(_at: AttrType, got: usize, max: usize) -> Result<()> {
    if got <= max {
        Ok(())
    } else {
        Err(Error::ErrAttributeSizeOverflow)
    }
}

pub fn is_attr_size_overflow(err: &Error) -> bool {
    matches!(err, Error::ErrAttributeSizeOverflow)
}
