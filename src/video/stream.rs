
use std::sync::Mutex;
use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::bwe::{BitrateController, BitrateControllerConfig};
use crate::media::{is_h264_keyframe, VideoDecoder, VideoEncoder, VideoFrame};
use crate::video::frame_assembler::{FrameAssembler, FrameAssemblerConfig};

/// RTP video clock rate (RFC 3551).
const VIDEO_CLOCK_HZ: u32 = 90_000;
/// Keyframe requests are batched: at most one per this window.
const KEYFRAME_REQUEST_INTERVAL: Duration = Duration::from_millis(500);

/// `(encoded, rtp_timestamp, sequence, is_keyframe)` per encoded frame.
pub type VideoSendCallback = Box<dyn Fn(&Bytes, u32, u16, bool) + Send + Sync>;

/// A decoded frame ready for display.
pub type VideoRenderCallback = Box<dyn Fn(&VideoFrame) + Send + Sync>;

/// The receive side needs a decoder refresh from the publisher.
pub type KeyframeRequestCallback = Box<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone)]
pub struct VideoStreamConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub bitrate: BitrateControllerConfig,
    pub assembler: FrameAssemblerConfig,
}

impl Default for VideoStreamConfig {
    fn default() -> Self {
        VideoStreamConfig {
            width: 1280,
            height: 720,
            fps: 30,
            bitrate: BitrateControllerConfig::default(),
            assembler: FrameAssemblerConfig::default(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct VideoStreamStats {
    pub frames_sent: u64,
    pub keyframes_sent: u64,
    pub packets_received: u64,
    pub frames_rendered: u64,
    pub frames_dropped: u64,
    pub keyframe_requests_sent: u64,
    pub current_bitrate_bps: u64,
}

struct StreamInner {
    encoder: Box<dyn VideoEncoder>,
    decoder: Box<dyn VideoDecoder>,
    assembler: FrameAssembler,

    timestamp: u32,
    sequence: u16,
    enabled: bool,
    applied_bitrate_bps: u64,
    last_keyframe_request: Option<Instant>,

    send_callback: Option<VideoSendCallback>,
    render_callback: Option<VideoRenderCallback>,
    keyframe_request_callback: Option<KeyframeRequestCallback>,

    stats: VideoStreamStats,
}

/// The video pipeline pair:
///
/// send: capture -> encode -> send callback, timestamps stepping by
/// 90000/fps per frame; the bitrate controller runs per frame and its output
/// is pushed into the encoder.
///
/// receive: packet -> keyframe tagging -> frame assembler; a decode tick
/// pops complete frames, decodes and renders, and keyframe requests flow
/// back to the publisher through the request callback.
pub struct VideoStream {
    config: VideoStreamConfig,
    bitrate: BitrateController,
    inner: Mutex<StreamInner>,
}

impl VideoStream {
    pub fn new(
        config: VideoStreamConfig,
        encoder: Box<dyn VideoEncoder>,
        decoder: Box<dyn VideoDecoder>,
    ) -> Self {
        let bitrate = BitrateController::new(config.bitrate.clone());
        let assembler = FrameAssembler::new(config.assembler.clone());
        let start_bitrate = config.bitrate.start_bitrate_bps;
        VideoStream {
            config,
            bitrate,
            inner: Mutex::new(StreamInner {
                encoder,
                decoder,
                assembler,
                timestamp: 0,
                sequence: 0,
                enabled: true,
                applied_bitrate_bps: start_bitrate,
                last_keyframe_request: None,
                send_callback: None,
                render_callback: None,
                keyframe_request_callback: None,
                stats: VideoStreamStats::default(),
            }),
        }
    }

    pub fn set_send_callback(&self, callback: VideoSendCallback) {
        self.inner.lock().unwrap().send_callback = Some(callback);
    }

    pub fn set_render_callback(&self, callback: VideoRenderCallback) {
        self.inner.lock().unwrap().render_callback = Some(callback);
    }

    pub fn set_keyframe_request_callback(&self, callback: KeyframeRequestCallback) {
        self.inner.lock().unwrap().keyframe_request_callback = Some(callback);
    }

    /// Capture-side entry: encode and emit one frame.
    pub fn on_captured_frame(&self, frame: &VideoFrame) {
        // Drive the controller once per frame; a changed estimate reaches
        // the encoder before this frame is encoded.
        self.bitrate.process();
        let target = self.bitrate.current_bitrate();

        let mut inner = self.inner.lock().unwrap();
        let inner = &mut *inner;

        if !inner.enabled {
            return;
        }

        if target != inner.applied_bitrate_bps {
            inner.applied_bitrate_bps = target;
            inner.encoder.set_bitrate((target / 1000) as u32);
        }
        inner.stats.current_bitrate_bps = target;

        let encoded = match inner.encoder.encode(frame) {
            Ok(e) => e,
            Err(err) => {
                log::warn!("video encode failed: {err}");
                inner.stats.frames_dropped += 1;
                return;
            }
        };

        inner.stats.frames_sent += 1;
        if encoded.is_keyframe {
            inner.stats.keyframes_sent += 1;
        }

        if let Some(cb) = &inner.send_callback {
            cb(&encoded.data, inner.timestamp, inner.sequence, encoded.is_keyframe);
        }
        inner.timestamp = inner
            .timestamp
            .wrapping_add(VIDEO_CLOCK_HZ / self.config.fps.max(1));
        inner.sequence = inner.sequence.wrapping_add(1);
    }

    /// Receive-side entry: one RTP payload off the wire.
    pub fn receive_packet(&self, payload: Bytes, timestamp: u32, sequence: u16, marker: bool) {
        self.receive_packet_at(payload, timestamp, sequence, marker, Instant::now())
    }

    pub fn receive_packet_at(
        &self,
        payload: Bytes,
        timestamp: u32,
        sequence: u16,
        marker: bool,
        now: Instant,
    ) {
        let mut inner = self.inner.lock().unwrap();
        let inner = &mut *inner;

        inner.stats.packets_received += 1;
        let keyframe = is_h264_keyframe(&payload);
        inner
            .assembler
            .insert_packet_at(payload, sequence, timestamp, marker, keyframe, now);

        if inner.assembler.should_request_keyframe() {
            Self::emit_keyframe_request(inner, now);
        }
    }

    /// Decode tick: pops at most one complete frame and renders it.
    pub fn decode_tick(&self) {
        self.decode_tick_at(Instant::now())
    }

    pub fn decode_tick_at(&self, now: Instant) {
        let mut inner = self.inner.lock().unwrap();
        let inner = &mut *inner;

        let Some(frame) = inner.assembler.pop_frame_at(now) else {
            return;
        };

        match inner.decoder.decode(&frame.data) {
            Ok(decoded) => {
                inner.stats.frames_rendered += 1;
                if let Some(cb) = &inner.render_callback {
                    cb(&decoded);
                }
            }
            Err(err) => {
                log::warn!("video decode failed: {err}");
                inner.stats.frames_dropped += 1;
                Self::emit_keyframe_request(inner, now);
            }
        }
    }

    fn emit_keyframe_request(inner: &mut StreamInner, now: Instant) {
        let due = inner
            .last_keyframe_request
            .map_or(true, |t| now.saturating_duration_since(t) >= KEYFRAME_REQUEST_INTERVAL);
        if !due {
            return;
        }
        inner.last_keyframe_request = Some(now);
        inner.stats.keyframe_requests_sent += 1;
        if let Some(cb) = &inner.keyframe_request_callback {
            cb();
        }
    }

    /// Ask the encoder for an intra frame (on PLI/FIR from a receiver).
    pub fn request_keyframe(&self) {
        self.inner.lock().unwrap().encoder.request_keyframe();
    }

    pub fn on_remb(&self, bitrate_bps: u64) {
        self.bitrate.on_remb(bitrate_bps);
    }

    pub fn on_packet_loss(&self, loss_rate: f32) {
        self.bitrate.on_packet_loss(loss_rate);
    }

    pub fn on_rtt(&self, rtt_ms: f32) {
        self.bitrate.on_rtt(rtt_ms);
    }

    pub fn set_target_bitrate(&self, bitrate_kbps: u32) {
        self.bitrate.set_bitrate(bitrate_kbps as u64 * 1000);
        let mut inner = self.inner.lock().unwrap();
        inner.encoder.set_bitrate(bitrate_kbps);
        inner.applied_bitrate_bps = bitrate_kbps as u64 * 1000;
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.inner.lock().unwrap().enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.lock().unwrap().enabled
    }

    pub fn stats(&self) -> VideoStreamStats {
        self.inner.lock().unwrap().stats
    }
}
