pub mod jitter_buffer;
pub mod stream;

pub use jitter_buffer::{JitterBuffer, JitterBufferConfig, JitterBufferStats, JitterFrame};
pub use stream::{AudioStream, AudioStreamConfig, AudioStreamStats};
