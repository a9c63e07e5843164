use super::*;

#[test]
fn test_h264_keyframe_detection() {
    assert!(is_h264_keyframe(&[0x65])); // IDR
    assert!(is_h264_keyframe(&[0x67])); // SPS
    assert!(is_h264_keyframe(&[0x68])); // PPS
    assert!(!is_h264_keyframe(&[0x61])); // non-IDR slice
    assert!(!is_h264_keyframe(&[]));
}

#[test]
fn test_audio_level_silence_floor() {
    assert_eq!(audio_level_dbfs(&[]), -96.0);
    assert_eq!(audio_level_dbfs(&[0; 960]), -96.0);
}

#[test]
fn test_audio_level_full_scale() {
    // A full-scale square wave sits at 0 dBFS.
    let samples: Vec<i16> = (0..960)
        .map(|i| if i % 2 == 0 { i16::MAX } else { i16::MIN + 1 })
        .collect();
    let level = audio_level_dbfs(&samples);
    assert!(level.abs() < 0.1, "expected ~0 dBFS, got {level}");
}

#[test]
fn test_audio_level_monotonic_in_amplitude() {
    let quiet: Vec<i16> = vec![1000; 960];
    let loud: Vec<i16> = vec![10000; 960];
    assert!(audio_level_dbfs(&loud) > audio_level_dbfs(&quiet));
}
