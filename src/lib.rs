#![warn(rust_2018_idioms)]
#![allow(dead_code)]

//! A real-time media server: a Selective Forwarding Unit that fans RTP out
//! without transcoding, a Multipoint Control Unit that mixes audio, and the
//! packet, connectivity and congestion plumbing both sit on.

pub mod audio;
pub mod bwe;
pub mod error;
pub mod mcu;
pub mod media;
pub mod pacer;
pub mod room;
pub mod sfu;
pub mod transport;
pub mod video;

pub use error::{Error, Result};

// Re-export the protocol crates so embedders need only this one dependency.
pub use {ice, rtcp, rtp, stun, turn, util};
