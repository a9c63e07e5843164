pub mod frame_assembler;
pub mod stream;

pub use frame_assembler::{
    BufferedFrame, FrameAssembler, FrameAssemblerConfig, FrameAssemblerStats,
};
pub use stream::{VideoStream, VideoStreamConfig, VideoStreamStats};
