use crate::error::Error;
use crate::proto::channum::{ChannelNumber, MAX_CHANNEL_NUMBER, MIN_CHANNEL_NUMBER};

const CHANNEL_DATA_HEADER_SIZE: usize = 4;
const PADDING: usize = 4;

fn nearest_padded_length(l: usize) -> usize {
    let mut n = PADDING * (l / PADDING);
    if n < l {
        n += PADDING;
    }
    n
}

/// ChannelData is the framing used on a bound channel: a 4-byte header
/// (channel number + length) followed by the application data, padded out to
/// a 4-byte boundary (RFC 5766 section 11.4).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChannelData {
    pub number: ChannelNumber,
    pub data: Vec<u8>,
}

impl ChannelData {
    /// Encodes the ChannelData message.
    pub fn encode(&self) -> Vec<u8> {
        let len = CHANNEL_DATA_HEADER_SIZE + self.data.len();
        let mut raw = Vec::with_capacity(nearest_padded_length(len));
        raw.extend_from_slice(&self.number.0.to_be_bytes());
        raw.extend_from_slice(&(self.data.len() as u16).to_be_bytes());
        raw.extend_from_slice(&self.data);
        raw.resize(nearest_padded_length(len), 0);
        raw
    }

    /// Decodes a ChannelData message, validating the channel number range
    /// and the length field.
    pub fn decode(raw: &[u8]) -> Result<Self, Error> {
        if raw.len() < CHANNEL_DATA_HEADER_SIZE {
            return Err(Error::ErrUnexpectedEof);
        }

        let number = ChannelNumber(u16::from_be_bytes([raw[0], raw[1]]));
        number.valid()?;

        let length = u16::from_be_bytes([raw[2], raw[3]]) as usize;
        if raw.len() < CHANNEL_DATA_HEADER_SIZE + length {
            return Err(Error::ErrBadChannelDataLength);
        }

        Ok(ChannelData {
            number,
            data: raw[CHANNEL_DATA_HEADER_SIZE..CHANNEL_DATA_HEADER_SIZE + length].to_vec(),
        })
    }

    /// Quick check whether a datagram looks like ChannelData: the first two
    /// bits are 01 (channel numbers start at 0x4000).
    pub fn is_channel_data(raw: &[u8]) -> bool {
        if raw.len() < CHANNEL_DATA_HEADER_SIZE {
            return false;
        }
        let number = u16::from_be_bytes([raw[0], raw[1]]);
        (MIN_CHANNEL_NUMBER..=MAX_CHANNEL_NUMBER).contains(&number)
    }
}
