#[cfg(test)]
mod media_test;

use bytes::Bytes;

use crate::error::Result;

/// Output of one audio encode call.
pub struct EncodedAudio {
    pub data: Bytes,
    pub samples_encoded: usize,
    pub voice_activity: bool,
}

/// Audio codec seam. Implementations wrap a concrete codec (Opus in
/// production, a pass-through stub in tests); `decode(encode(x))` is
/// expected to approximate `x` within the codec's error bounds.
pub trait AudioEncoder: Send {
    fn encode(&mut self, pcm: &[i16]) -> Result<EncodedAudio>;
    fn set_bitrate(&mut self, bitrate_bps: u32);
}

pub trait AudioDecoder: Send {
    fn decode(&mut self, data: &[u8], frame_size: usize) -> Result<Vec<i16>>;
    /// Packet-loss concealment: synthesize a frame with no input packet.
    fn conceal(&mut self, frame_size: usize) -> Result<Vec<i16>>;
    fn can_conceal(&self) -> bool;
}

/// In-place audio frame transform (echo cancellation, noise suppression,
/// gain control). The capture path runs it before encoding; the render path
/// feeds decoded audio back in for the canceller's reference signal.
pub trait AudioProcessor: Send {
    fn process_capture(&mut self, pcm: &mut [i16]);
    fn process_render(&mut self, pcm: &[i16]);
}

/// A YUV420 video frame from capture or decode.
#[derive(Debug, Clone, Default)]
pub struct VideoFrame {
    pub y: Bytes,
    pub u: Bytes,
    pub v: Bytes,
    pub stride_y: usize,
    pub stride_u: usize,
    pub stride_v: usize,
    pub width: u32,
    pub height: u32,
    pub timestamp_us: u64,
    pub is_keyframe: bool,
}

/// Output of one video encode call.
pub struct EncodedVideo {
    pub data: Bytes,
    pub is_keyframe: bool,
}

pub trait VideoEncoder: Send {
    fn encode(&mut self, frame: &VideoFrame) -> Result<EncodedVideo>;
    fn set_bitrate(&mut self, bitrate_kbps: u32);
    /// Force the next output frame to be a keyframe.
    fn request_keyframe(&mut self);
}

pub trait VideoDecoder: Send {
    fn decode(&mut self, data: &[u8]) -> Result<VideoFrame>;
}

// H.264 NAL unit types that start a decodable point.
const NAL_TYPE_IDR: u8 = 5;
const NAL_TYPE_SPS: u8 = 7;
const NAL_TYPE_PPS: u8 = 8;

/// True when an H.264 RTP payload carries keyframe material
/// (IDR slice, SPS or PPS).
pub fn is_h264_keyframe(payload: &[u8]) -> bool {
    if payload.is_empty() {
        return false;
    }
    matches!(payload[0] & 0x1F, NAL_TYPE_IDR | NAL_TYPE_SPS | NAL_TYPE_PPS)
}

/// Computes the RMS level of a PCM frame in dBFS, floored at -96 (silence
/// for 16-bit samples).
pub fn audio_level_dbfs(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return -96.0;
    }

    let sum_squares: i64 = samples.iter().map(|&s| s as i64 * s as i64).sum();
    let rms = ((sum_squares as f64) / samples.len() as f64).sqrt();
    if rms < 1.0 {
        return -96.0;
    }

    (20.0 * (rms / 32768.0).log10()) as f32
}
