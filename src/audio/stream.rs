
use std::sync::Mutex;
use std::time::Instant;

use bytes::Bytes;

use crate::audio::jitter_buffer::{JitterBuffer, JitterBufferConfig, JitterFrame};
use crate::media::{audio_level_dbfs, AudioDecoder, AudioEncoder, AudioProcessor};

/// `(encoded, rtp_timestamp, sequence)` for each encoded frame.
pub type AudioSendCallback = Box<dyn Fn(&Bytes, u32, u16) + Send + Sync>;

/// Decoded PCM ready for the output device.
pub type AudioPlaybackCallback = Box<dyn Fn(&[i16]) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct AudioStreamConfig {
    pub sample_rate: u32,
    pub channels: u32,
    pub frame_duration_ms: u32,
    pub jitter: JitterBufferConfig,
}

impl Default for AudioStreamConfig {
    fn default() -> Self {
        AudioStreamConfig {
            sample_rate: 48000,
            channels: 1,
            frame_duration_ms: 20,
            jitter: JitterBufferConfig::default(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AudioStreamStats {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub frames_played: u64,
    pub frames_concealed: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub input_level_dbfs: f32,
}

struct StreamInner {
    encoder: Box<dyn AudioEncoder>,
    decoder: Box<dyn AudioDecoder>,
    processor: Option<Box<dyn AudioProcessor>>,
    jitter: JitterBuffer,

    timestamp: u32,
    sequence: u16,
    muted: bool,
    volume: f32,

    send_callback: Option<AudioSendCallback>,
    playback_callback: Option<AudioPlaybackCallback>,

    stats: AudioStreamStats,
}

/// The audio pipeline pair:
///
/// send: capture -> processing -> level -> encode -> send callback, with the
/// RTP timestamp advancing by the samples encoded and the sequence by one.
///
/// receive: packet -> jitter buffer; a frame-rate playout tick pops, decodes
/// (or conceals a loss) and hands PCM to the playback callback and the
/// processor's render path.
pub struct AudioStream {
    config: AudioStreamConfig,
    frame_size: usize,
    inner: Mutex<StreamInner>,
}

impl AudioStream {
    pub fn new(
        config: AudioStreamConfig,
        encoder: Box<dyn AudioEncoder>,
        decoder: Box<dyn AudioDecoder>,
        processor: Option<Box<dyn AudioProcessor>>,
    ) -> Self {
        let frame_size =
            (config.sample_rate * config.frame_duration_ms / 1000 * config.channels) as usize;
        let jitter = JitterBuffer::new(config.jitter.clone());
        AudioStream {
            config,
            frame_size,
            inner: Mutex::new(StreamInner {
                encoder,
                decoder,
                processor,
                jitter,
                timestamp: 0,
                sequence: 0,
                muted: false,
                volume: 1.0,
                send_callback: None,
                playback_callback: None,
                stats: AudioStreamStats::default(),
            }),
        }
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn set_send_callback(&self, callback: AudioSendCallback) {
        self.inner.lock().unwrap().send_callback = Some(callback);
    }

    pub fn set_playback_callback(&self, callback: AudioPlaybackCallback) {
        self.inner.lock().unwrap().playback_callback = Some(callback);
    }

    /// Capture-side entry: one PCM frame from the device.
    pub fn on_captured_audio(&self, pcm: &mut [i16]) {
        let mut inner = self.inner.lock().unwrap();
        let inner = &mut *inner;

        if let Some(processor) = &mut inner.processor {
            processor.process_capture(pcm);
        }

        if inner.volume != 1.0 {
            for s in pcm.iter_mut() {
                *s = (*s as f32 * inner.volume).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
            }
        }

        inner.stats.input_level_dbfs = audio_level_dbfs(pcm);

        if inner.muted {
            return;
        }

        let encoded = match inner.encoder.encode(pcm) {
            Ok(e) => e,
            Err(err) => {
                log::warn!("audio encode failed: {err}");
                return;
            }
        };

        inner.stats.packets_sent += 1;
        inner.stats.bytes_sent += encoded.data.len() as u64;

        if let Some(cb) = &inner.send_callback {
            cb(&encoded.data, inner.timestamp, inner.sequence);
        }
        inner.timestamp = inner.timestamp.wrapping_add(encoded.samples_encoded as u32);
        inner.sequence = inner.sequence.wrapping_add(1);
    }

    /// Receive-side entry: one encoded packet off the wire.
    pub fn receive_packet(&self, data: Bytes, timestamp: u32, sequence: u16) {
        self.receive_packet_at(data, timestamp, sequence, Instant::now())
    }

    pub fn receive_packet_at(&self, data: Bytes, timestamp: u32, sequence: u16, now: Instant) {
        let mut inner = self.inner.lock().unwrap();
        inner.stats.packets_received += 1;
        inner.stats.bytes_received += data.len() as u64;
        inner.jitter.push(JitterFrame {
            data,
            timestamp,
            sequence_number: sequence,
            arrival_time: now,
        });
    }

    /// Playout tick, scheduled every frame period. Pops one frame if ready,
    /// otherwise conceals the loss when the decoder can.
    pub fn playout_tick(&self) {
        self.playout_tick_at(Instant::now())
    }

    pub fn playout_tick_at(&self, now: Instant) {
        let mut inner = self.inner.lock().unwrap();
        let inner = &mut *inner;
        let frame_size = self.frame_size;

        let pcm = match inner.jitter.pop_at(now) {
            Some(frame) => match inner.decoder.decode(&frame.data, frame_size) {
                Ok(pcm) => {
                    inner.stats.frames_played += 1;
                    pcm
                }
                Err(err) => {
                    log::warn!("audio decode failed: {err}");
                    return;
                }
            },
            // Conceal only once the stream has started; an idle receiver
            // stays silent.
            None if inner.stats.packets_received > 0 && inner.decoder.can_conceal() => {
                match inner.decoder.conceal(frame_size) {
                    Ok(pcm) => {
                        inner.stats.frames_concealed += 1;
                        pcm
                    }
                    Err(_) => return,
                }
            }
            None => return,
        };

        if let Some(processor) = &mut inner.processor {
            processor.process_render(&pcm);
        }
        if let Some(cb) = &inner.playback_callback {
            cb(&pcm);
        }
    }

    pub fn set_muted(&self, muted: bool) {
        self.inner.lock().unwrap().muted = muted;
    }

    pub fn is_muted(&self) -> bool {
        self.inner.lock().unwrap().muted
    }

    pub fn set_volume(&self, volume: f32) {
        self.inner.lock().unwrap().volume = volume.clamp(0.0, 2.0);
    }

    pub fn set_encoder_bitrate(&self, bitrate_bps: u32) {
        self.inner.lock().unwrap().encoder.set_bitrate(bitrate_bps);
    }

    pub fn stats(&self) -> AudioStreamStats {
        self.inner.lock().unwrap().stats
    }

    pub fn reset_receiver(&self) {
        self.inner.lock().unwrap().jitter.reset();
    }
}
