#[cfg(test)]
mod conference_bridge_test;

use std::sync::atomic::{AtomicBool, Ordering};

use super::ParticipantId;
use crate::mcu::{
    ActiveSpeakerCallback, AudioMixer, AudioMixerConfig, MixedAudioCallback, MixingParams,
};

#[derive(Debug, Clone, Default)]
pub struct ConferenceBridgeConfig {
    pub audio: AudioMixerConfig,
}

/// MCU-mode façade: owns the audio mixer and relays per-participant mixes
/// out through its output callback. Video compositing is not part of this
/// bridge; video stays on the SFU path.
pub struct ConferenceBridge {
    mixer: AudioMixer,
    running: AtomicBool,
}

impl ConferenceBridge {
    pub fn new(config: ConferenceBridgeConfig) -> Self {
        ConferenceBridge {
            mixer: AudioMixer::new(config.audio),
            running: AtomicBool::new(false),
        }
    }

    pub fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn set_output_callback(&self, callback: MixedAudioCallback) {
        self.mixer.set_mixed_audio_callback(callback);
    }

    pub fn set_active_speaker_callback(&self, callback: ActiveSpeakerCallback) {
        self.mixer.set_active_speaker_callback(callback);
    }

    pub fn add_participant(&self, participant_id: &ParticipantId) {
        self.mixer.add_source(participant_id, MixingParams::default());
    }

    pub fn remove_participant(&self, participant_id: &ParticipantId) {
        self.mixer.remove_source(participant_id);
    }

    pub fn push_audio(&self, participant_id: &ParticipantId, samples: &[i16], timestamp: u32) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }
        self.mixer.push_audio(participant_id, samples, timestamp);
    }

    pub fn set_audio_params(&self, participant_id: &ParticipantId, params: MixingParams) {
        self.mixer.set_mixing_params(participant_id, params);
    }

    pub fn set_muted(&self, participant_id: &ParticipantId, muted: bool) {
        self.mixer.set_mixing_params(
            participant_id,
            MixingParams {
                muted,
                ..Default::default()
            },
        );
    }

    /// One mixing period; call every frame duration while running.
    pub fn process(&self) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }
        self.mixer.process();
    }

    pub fn active_speaker(&self) -> Option<ParticipantId> {
        self.mixer.active_speaker()
    }

    pub fn participant_count(&self) -> usize {
        self.mixer.source_count()
    }

    pub fn mixer(&self) -> &AudioMixer {
        &self.mixer
    }
}
