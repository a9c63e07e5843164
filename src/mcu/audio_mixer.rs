#[cfg(test)]
mod audio_mixer_test;

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::media::audio_level_dbfs;
use crate::sfu::ParticipantId;

/// A source quieter than this can never become the active speaker.
const ACTIVE_SPEAKER_FLOOR_DBFS: f32 = -40.0;

#[derive(Debug, Clone)]
pub struct AudioMixerConfig {
    pub sample_rate: u32,
    pub channels: u32,
    pub frame_duration_ms: u32,
}

impl Default for AudioMixerConfig {
    fn default() -> Self {
        AudioMixerConfig {
            sample_rate: 48000,
            channels: 1,
            frame_duration_ms: 20,
        }
    }
}

/// Per-source mixing controls.
#[derive(Debug, Clone, Copy)]
pub struct MixingParams {
    /// 0.0 - 2.0.
    pub volume: f32,
    /// -1.0 (left) to 1.0 (right); 0.0 = center. Stereo output only.
    pub pan: f32,
    pub muted: bool,
}

impl Default for MixingParams {
    fn default() -> Self {
        MixingParams {
            volume: 1.0,
            pan: 0.0,
            muted: false,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AudioMixerStats {
    pub active_sources: usize,
    pub mixed_frames: u64,
}

/// `(recipient, mixed_samples, timestamp)`; the mix excludes the recipient's
/// own audio.
pub type MixedAudioCallback =
    Box<dyn Fn(&ParticipantId, &[i16], u32) + Send + Sync>;

/// `(participant, level_dbfs)` whenever the loudest unmuted source changes.
pub type ActiveSpeakerCallback = Box<dyn Fn(&ParticipantId, f32) + Send + Sync>;

struct AudioSource {
    params: MixingParams,
    buffer: Vec<i16>,
    level_dbfs: f32,
    last_timestamp: u32,
    has_data: bool,
}

struct MixerInner {
    sources: BTreeMap<ParticipantId, AudioSource>,
    mixed_callback: Option<MixedAudioCallback>,
    speaker_callback: Option<ActiveSpeakerCallback>,
    active_speaker: Option<ParticipantId>,
    mix_buffer: Vec<i32>,
    output_buffer: Vec<i16>,
    stats: AudioMixerStats,
}

/// N-to-N audio mixer for MCU mode: every `process()` builds one mix per
/// participant from everyone else's most recent frame.
pub struct AudioMixer {
    config: AudioMixerConfig,
    frame_size: usize,
    inner: Mutex<MixerInner>,
}

impl AudioMixer {
    pub fn new(config: AudioMixerConfig) -> Self {
        let frame_size =
            (config.sample_rate * config.frame_duration_ms / 1000 * config.channels) as usize;
        AudioMixer {
            config,
            frame_size,
            inner: Mutex::new(MixerInner {
                sources: BTreeMap::new(),
                mixed_callback: None,
                speaker_callback: None,
                active_speaker: None,
                mix_buffer: vec![0; frame_size],
                output_buffer: vec![0; frame_size],
                stats: AudioMixerStats::default(),
            }),
        }
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn set_mixed_audio_callback(&self, callback: MixedAudioCallback) {
        self.inner.lock().unwrap().mixed_callback = Some(callback);
    }

    pub fn set_active_speaker_callback(&self, callback: ActiveSpeakerCallback) {
        self.inner.lock().unwrap().speaker_callback = Some(callback);
    }

    pub fn add_source(&self, participant_id: &ParticipantId, params: MixingParams) {
        let mut inner = self.inner.lock().unwrap();
        inner.sources.insert(
            participant_id.clone(),
            AudioSource {
                params,
                buffer: vec![0; self.frame_size],
                level_dbfs: -96.0,
                last_timestamp: 0,
                has_data: false,
            },
        );
        inner.stats.active_sources = inner.sources.len();
    }

    pub fn remove_source(&self, participant_id: &ParticipantId) {
        let mut inner = self.inner.lock().unwrap();
        inner.sources.remove(participant_id);
        inner.stats.active_sources = inner.sources.len();
        if inner.active_speaker.as_ref() == Some(participant_id) {
            inner.active_speaker = None;
        }
    }

    pub fn set_mixing_params(&self, participant_id: &ParticipantId, params: MixingParams) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(source) = inner.sources.get_mut(participant_id) {
            source.params = params;
        }
    }

    /// Stores one frame of PCM for the source and refreshes its level.
    /// Samples beyond the frame size are truncated.
    pub fn push_audio(&self, participant_id: &ParticipantId, samples: &[i16], timestamp: u32) {
        let mut inner = self.inner.lock().unwrap();
        let Some(source) = inner.sources.get_mut(participant_id) else {
            return;
        };

        let n = samples.len().min(source.buffer.len());
        source.buffer[..n].copy_from_slice(&samples[..n]);
        source.buffer[n..].fill(0);

        source.level_dbfs = audio_level_dbfs(&source.buffer);
        source.last_timestamp = timestamp;
        source.has_data = true;
    }

    /// Runs one mixing period: updates the active speaker, emits one mix per
    /// recipient (excluding their own audio), and clears the frame flags.
    pub fn process(&self) {
        let mut inner = self.inner.lock().unwrap();
        let inner = &mut *inner;

        if inner.sources.is_empty() {
            return;
        }

        // Active speaker: the loudest unmuted source above the floor.
        let loudest = inner
            .sources
            .iter()
            .filter(|(_, s)| !s.params.muted)
            .max_by(|a, b| a.1.level_dbfs.total_cmp(&b.1.level_dbfs))
            .map(|(id, s)| (id.clone(), s.level_dbfs));
        if let Some((id, level)) = loudest {
            if level > ACTIVE_SPEAKER_FLOOR_DBFS && inner.active_speaker.as_ref() != Some(&id) {
                inner.active_speaker = Some(id.clone());
                if let Some(cb) = &inner.speaker_callback {
                    cb(&id, level);
                }
            }
        }

        let recipients: Vec<ParticipantId> = inner.sources.keys().cloned().collect();
        let stereo = self.config.channels == 2;

        for recipient in &recipients {
            inner.mix_buffer.fill(0);

            for (source_id, source) in &inner.sources {
                if source_id == recipient || !source.has_data || source.params.muted {
                    continue;
                }

                let vol = source.params.volume;
                if stereo {
                    // Constant-power pan across interleaved L/R samples.
                    let pan = source.params.pan;
                    let left_gain = vol * ((1.0 - pan) / 2.0).sqrt();
                    let right_gain = vol * ((1.0 + pan) / 2.0).sqrt();

                    for i in (0..source.buffer.len()).step_by(2) {
                        inner.mix_buffer[i] += (source.buffer[i] as f32 * left_gain) as i32;
                        if i + 1 < source.buffer.len() {
                            inner.mix_buffer[i + 1] +=
                                (source.buffer[i + 1] as f32 * right_gain) as i32;
                        }
                    }
                } else {
                    for (acc, &sample) in inner.mix_buffer.iter_mut().zip(&source.buffer) {
                        *acc += (sample as f32 * vol) as i32;
                    }
                }
            }

            // Saturate the 32-bit accumulator into the 16-bit output frame.
            for (out, &acc) in inner.output_buffer.iter_mut().zip(&inner.mix_buffer) {
                *out = acc.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
            }

            if let Some(cb) = &inner.mixed_callback {
                let timestamp = inner
                    .sources
                    .get(recipient)
                    .map(|s| s.last_timestamp)
                    .unwrap_or(0);
                cb(recipient, &inner.output_buffer, timestamp);
            }
        }

        inner.stats.mixed_frames += 1;

        for source in inner.sources.values_mut() {
            source.has_data = false;
        }
    }

    pub fn active_speaker(&self) -> Option<ParticipantId> {
        self.inner.lock().unwrap().active_speaker.clone()
    }

    pub fn source_count(&self) -> usize {
        self.inner.lock().unwrap().sources.len()
    }

    pub fn stats(&self) -> AudioMixerStats {
        self.inner.lock().unwrap().stats
    }
}
