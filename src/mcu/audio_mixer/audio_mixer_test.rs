use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use super::*;

type Mixes = Arc<StdMutex<HashMap<ParticipantId, Vec<i16>>>>;

fn mixer_with_capture(config: AudioMixerConfig) -> (AudioMixer, Mixes) {
    let mixer = AudioMixer::new(config);
    let mixes: Mixes = Arc::new(StdMutex::new(HashMap::new()));
    let mixes2 = Arc::clone(&mixes);
    mixer.set_mixed_audio_callback(Box::new(move |recipient, samples, _ts| {
        mixes2
            .lock()
            .unwrap()
            .insert(recipient.clone(), samples.to_vec());
    }));
    (mixer, mixes)
}

fn frame(mixer: &AudioMixer, value: i16) -> Vec<i16> {
    vec![value; mixer.frame_size()]
}

#[test]
fn test_mix_excludes_own_audio() {
    // Three sources at constant 1000: everyone hears the sum of the other
    // two, never themselves.
    let (mixer, mixes) = mixer_with_capture(AudioMixerConfig::default());
    for id in ["a", "b", "c"] {
        mixer.add_source(&id.to_owned(), MixingParams::default());
    }

    let samples = frame(&mixer, 1000);
    for id in ["a", "b", "c"] {
        mixer.push_audio(&id.to_owned(), &samples, 960);
    }
    mixer.process();

    let mixes = mixes.lock().unwrap();
    for id in ["a", "b", "c"] {
        let mix = &mixes[&id.to_owned()];
        assert!(
            mix.iter().all(|&s| s == 2000),
            "mix for {id} should be exactly the two other sources"
        );
    }
}

#[test]
fn test_muted_source_is_excluded_everywhere() {
    let (mixer, mixes) = mixer_with_capture(AudioMixerConfig::default());
    for id in ["a", "b", "c"] {
        mixer.add_source(&id.to_owned(), MixingParams::default());
    }
    mixer.set_mixing_params(
        &"a".to_owned(),
        MixingParams {
            muted: true,
            ..Default::default()
        },
    );

    let samples = frame(&mixer, 1000);
    for id in ["a", "b", "c"] {
        mixer.push_audio(&id.to_owned(), &samples, 960);
    }
    mixer.process();

    let mixes = mixes.lock().unwrap();
    // b hears only c.
    assert!(mixes[&"b".to_owned()].iter().all(|&s| s == 1000));
    // a (muted) still receives a mix, still excluding a.
    assert!(mixes[&"a".to_owned()].iter().all(|&s| s == 2000));
}

#[test]
fn test_single_participant_hears_silence() {
    let (mixer, mixes) = mixer_with_capture(AudioMixerConfig::default());
    mixer.add_source(&"solo".to_owned(), MixingParams::default());
    mixer.push_audio(&"solo".to_owned(), &frame(&mixer, 12000), 960);
    mixer.process();

    let mixes = mixes.lock().unwrap();
    assert!(mixes[&"solo".to_owned()].iter().all(|&s| s == 0));
}

#[test]
fn test_volume_scales_contribution() {
    let (mixer, mixes) = mixer_with_capture(AudioMixerConfig::default());
    mixer.add_source(&"listener".to_owned(), MixingParams::default());
    mixer.add_source(
        &"talker".to_owned(),
        MixingParams {
            volume: 0.5,
            ..Default::default()
        },
    );

    mixer.push_audio(&"talker".to_owned(), &frame(&mixer, 1000), 960);
    mixer.process();

    let mixes = mixes.lock().unwrap();
    assert!(mixes[&"listener".to_owned()].iter().all(|&s| s == 500));
}

#[test]
fn test_mix_saturates_instead_of_wrapping() {
    let (mixer, mixes) = mixer_with_capture(AudioMixerConfig::default());
    for id in ["a", "b", "c"] {
        mixer.add_source(&id.to_owned(), MixingParams::default());
    }

    let loud = frame(&mixer, 30000);
    for id in ["a", "b", "c"] {
        mixer.push_audio(&id.to_owned(), &loud, 960);
    }
    mixer.process();

    let mixes = mixes.lock().unwrap();
    // 30000 + 30000 overflows i16: must clamp, not wrap negative.
    assert!(mixes[&"a".to_owned()].iter().all(|&s| s == i16::MAX));
}

#[test]
fn test_stereo_constant_power_pan() {
    let config = AudioMixerConfig {
        channels: 2,
        ..Default::default()
    };
    let (mixer, mixes) = mixer_with_capture(config);
    mixer.add_source(&"listener".to_owned(), MixingParams::default());
    mixer.add_source(
        &"talker".to_owned(),
        MixingParams {
            pan: 1.0, // hard right
            ..Default::default()
        },
    );

    mixer.push_audio(&"talker".to_owned(), &frame(&mixer, 10000), 960);
    mixer.process();

    let mixes = mixes.lock().unwrap();
    let mix = &mixes[&"listener".to_owned()];
    // Left channel silent, right at full amplitude.
    assert!(mix.iter().step_by(2).all(|&l| l == 0));
    assert!(mix.iter().skip(1).step_by(2).all(|&r| r == 10000));
}

#[test]
fn test_active_speaker_detection() {
    let (mixer, _mixes) = mixer_with_capture(AudioMixerConfig::default());
    let speakers = Arc::new(StdMutex::new(vec![]));
    let speakers2 = Arc::clone(&speakers);
    mixer.set_active_speaker_callback(Box::new(move |id, level| {
        speakers2.lock().unwrap().push((id.clone(), level));
    }));

    mixer.add_source(&"quiet".to_owned(), MixingParams::default());
    mixer.add_source(&"loud".to_owned(), MixingParams::default());

    mixer.push_audio(&"quiet".to_owned(), &frame(&mixer, 100), 960);
    mixer.push_audio(&"loud".to_owned(), &frame(&mixer, 20000), 960);
    mixer.process();

    assert_eq!(mixer.active_speaker(), Some("loud".to_owned()));
    let events = speakers.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, "loud");

    // Repeating the same frame must not re-announce the same speaker.
    drop(events);
    mixer.push_audio(&"loud".to_owned(), &frame(&mixer, 20000), 1920);
    mixer.process();
    assert_eq!(speakers.lock().unwrap().len(), 1);
}

#[test]
fn test_whisper_does_not_become_active_speaker() {
    let (mixer, _mixes) = mixer_with_capture(AudioMixerConfig::default());
    mixer.add_source(&"whisper".to_owned(), MixingParams::default());

    // Amplitude 50 is around -56 dBFS, below the -40 floor.
    mixer.push_audio(&"whisper".to_owned(), &frame(&mixer, 50), 960);
    mixer.process();

    assert_eq!(mixer.active_speaker(), None);
}

#[test]
fn test_stale_frames_are_not_remixed() {
    let (mixer, mixes) = mixer_with_capture(AudioMixerConfig::default());
    mixer.add_source(&"listener".to_owned(), MixingParams::default());
    mixer.add_source(&"talker".to_owned(), MixingParams::default());

    mixer.push_audio(&"talker".to_owned(), &frame(&mixer, 1000), 960);
    mixer.process();
    assert!(mixes.lock().unwrap()[&"listener".to_owned()]
        .iter()
        .all(|&s| s == 1000));

    // No new push: the previous frame's has_data flag was cleared.
    mixer.process();
    assert!(mixes.lock().unwrap()[&"listener".to_owned()]
        .iter()
        .all(|&s| s == 0));
}
