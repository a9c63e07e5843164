pub mod audio_mixer;

pub use audio_mixer::{
    ActiveSpeakerCallback, AudioMixer, AudioMixerConfig, AudioMixerStats, MixedAudioCallback,
    MixingParams,
};
