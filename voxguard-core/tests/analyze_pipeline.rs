use std::io::Cursor;
use std::sync::Arc;
use std::thread;

use approx::assert_relative_eq;
use voxguard_core::classify::{REASON_EXTREME, REASON_LOW_ZCR};
use voxguard_core::{
    analyze, AnalysisError, AnalysisOutcome, Analyzer, AnalyzerConfig, ContainerFormat,
    RawAudioClip, ThresholdPreset, Verdict,
};

fn wav_bytes(samples: &[f32], sample_rate: u32, channels: u16) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for &s in samples {
            for _ in 0..channels {
                writer
                    .write_sample((s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                    .unwrap();
            }
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

fn sine(freq: f32, amplitude: f32, seconds: f32, sample_rate: u32) -> Vec<f32> {
    let len = (seconds * sample_rate as f32) as usize;
    (0..len)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            amplitude * (2.0 * std::f32::consts::PI * freq * t).sin()
        })
        .collect()
}

/// Deterministic broadband noise (xorshift) with many sign changes per frame.
fn noise(amplitude: f32, seconds: f32, sample_rate: u32) -> Vec<f32> {
    let len = (seconds * sample_rate as f32) as usize;
    let mut state: u32 = 0x9E37_79B9;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            amplitude * (state as f32 / u32::MAX as f32 * 2.0 - 1.0)
        })
        .collect()
}

#[test]
fn short_clip_is_rejected_before_features() {
    let bytes = wav_bytes(&sine(220.0, 0.5, 0.3, 16_000), 16_000, 1);
    let err = analyze(&bytes, "mic").unwrap_err();
    assert_eq!(
        err,
        AnalysisError::ClipTooShort {
            min_seconds: 0.5,
            actual_seconds: 0.3,
        }
    );
}

#[test]
fn short_clip_at_device_rate_reports_resampled_duration() {
    let bytes = wav_bytes(&sine(220.0, 0.5, 0.3, 48_000), 48_000, 1);
    match analyze(&bytes, "mic") {
        Err(AnalysisError::ClipTooShort {
            min_seconds,
            actual_seconds,
        }) => {
            assert_eq!(min_seconds, 0.5);
            assert_relative_eq!(actual_seconds, 0.3, epsilon = 1e-3);
        }
        other => panic!("expected ClipTooShort, got {other:?}"),
    }
}

#[test]
fn flat_tone_is_flagged_synthetic() {
    let bytes = wav_bytes(&sine(480.0, 0.5, 2.0, 16_000), 16_000, 1);
    let report = analyze(&bytes, "tone.wav").unwrap();

    assert!(report.features.zcr < 0.07, "zcr={}", report.features.zcr);
    assert!(report.score >= 2, "score={}", report.score);
    assert_eq!(report.verdict, Verdict::Synthetic);
    assert_eq!(report.reasons.first().map(String::as_str), Some(REASON_LOW_ZCR));
    assert_eq!(report.reasons.last().map(String::as_str), Some(REASON_EXTREME));
    assert_relative_eq!(report.duration_seconds, 2.0, epsilon = 1e-9);
    assert_eq!(report.source, "tone.wav");
}

#[test]
fn broadband_signal_is_not_flagged_by_zcr_rules() {
    let bytes = wav_bytes(&noise(0.3, 1.5, 16_000), 16_000, 1);
    let report = analyze(&bytes, "noise.wav").unwrap();

    assert!(report.features.zcr > 0.3, "zcr={}", report.features.zcr);
    assert!(!report.reasons.iter().any(|r| r == REASON_LOW_ZCR));
    assert!(!report.reasons.iter().any(|r| r == REASON_EXTREME));
    assert!(report.score <= 1);
    assert_eq!(report.verdict, Verdict::Human);
}

#[test]
fn features_stay_in_range_for_varied_inputs() {
    let inputs = [
        vec![0.0f32; 12_000],
        sine(110.0, 0.9, 1.0, 16_000),
        sine(3_000.0, 0.05, 0.75, 16_000),
        noise(0.8, 0.6, 16_000),
    ];
    for samples in &inputs {
        let report = analyze(&wav_bytes(samples, 16_000, 1), "range").unwrap();
        let f = report.features;
        assert!(f.rms >= 0.0, "rms={}", f.rms);
        assert!((0.0..=1.0).contains(&f.zcr), "zcr={}", f.zcr);
        assert!(f.timbre_variance >= 0.0, "var={}", f.timbre_variance);
        assert!(report.score <= 3);
        assert_eq!(report.verdict.is_synthetic(), report.score >= 2);
        assert_eq!(report.reasons.len(), report.score as usize);
    }
}

#[test]
fn identical_bytes_yield_identical_reports() {
    let bytes = wav_bytes(&noise(0.2, 1.0, 22_050), 22_050, 1);
    let first = analyze(&bytes, "same").unwrap();
    let second = analyze(&bytes, "same").unwrap();
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn stereo_upload_is_downmixed_and_resampled() {
    let bytes = wav_bytes(&sine(300.0, 0.4, 1.0, 44_100), 44_100, 2);
    let report = analyze(&bytes, "stereo.wav").unwrap();
    assert_relative_eq!(report.duration_seconds, 1.0, epsilon = 1e-3);
    // 2 * 300 / 16000 crossings per sample.
    assert!((report.features.zcr - 0.0375).abs() < 0.005, "zcr={}", report.features.zcr);
}

#[test]
fn corrupt_bytes_are_a_decode_error() {
    let err = analyze(b"RIFF\xff\xff\xff\xffWAVEjunkjunkjunk", "broken.wav").unwrap_err();
    assert!(matches!(err, AnalysisError::Decode { .. }), "{err:?}");

    let err = analyze(&[0x42u8; 1_024], "mystery").unwrap_err();
    assert!(matches!(err, AnalysisError::Decode { .. }), "{err:?}");
}

#[test]
fn decode_failure_becomes_reportable_outcome() {
    let outcome = AnalysisOutcome::new("mystery", analyze(&[0x42u8; 64], "mystery"));
    assert!(!outcome.is_ok());
    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["status"], "error");
    assert_eq!(json["kind"]["type"], "decode");
    assert_eq!(json["source"], "mystery");
}

#[test]
fn non_finite_float_wav_is_a_decode_error() {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut samples = sine(220.0, 0.5, 1.0, 16_000);
    samples[100] = f32::NAN;
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for &s in &samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    let err = analyze(&cursor.into_inner(), "nan.wav").unwrap_err();
    assert_eq!(
        err,
        AnalysisError::Decode {
            cause: "non-finite sample".into()
        }
    );
}

#[cfg(feature = "compressed")]
#[test]
fn mp3_upload_is_decoded_and_resampled() {
    // 60 silent MPEG-1 Layer III frames: 128 kbit/s, 44.1 kHz, mono.
    let mut bytes = Vec::new();
    for _ in 0..60 {
        bytes.extend_from_slice(&[0xFF, 0xFB, 0x90, 0xC0]);
        bytes.extend(std::iter::repeat(0u8).take(413));
    }
    assert_eq!(RawAudioClip::new(bytes.as_slice()).format(), ContainerFormat::Mp3);

    let report = analyze(&bytes, "silence.mp3").unwrap();
    assert_relative_eq!(
        report.duration_seconds,
        60.0 * 1152.0 / 44_100.0,
        epsilon = 1e-3
    );
    assert!(report.features.rms < 1e-4, "rms={}", report.features.rms);
    assert_eq!(report.source, "silence.mp3");
}

#[test]
fn declared_format_routes_the_decoder() {
    let bytes = wav_bytes(&sine(200.0, 0.3, 0.8, 16_000), 16_000, 1);
    let clip = RawAudioClip::with_declared_format(bytes, "recording.WAV");
    assert_eq!(clip.format(), ContainerFormat::Wav);
    let analyzer = Analyzer::new(AnalyzerConfig::default()).unwrap();
    assert!(analyzer.analyze_clip(clip, "recording.WAV").is_ok());
}

#[test]
fn preset_changes_only_the_thresholds() {
    let bytes = wav_bytes(&sine(560.0, 0.5, 1.0, 16_000), 16_000, 1);
    let field = Analyzer::new(AnalyzerConfig::default()).unwrap();
    let lenient = Analyzer::new(
        AnalyzerConfig::default().with_thresholds(ThresholdPreset::Lenient.profile()),
    )
    .unwrap();

    let a = field.analyze(&bytes, "tone").unwrap();
    let b = lenient.analyze(&bytes, "tone").unwrap();
    assert_eq!(a.features, b.features);
    // zcr ≈ 0.07: below both ZCR floors.
    assert!(a.reasons.iter().any(|r| r == REASON_LOW_ZCR));
    assert!(b.reasons.iter().any(|r| r == REASON_LOW_ZCR));
}

#[test]
fn concurrent_callers_share_one_analyzer() {
    let analyzer = Arc::new(Analyzer::new(AnalyzerConfig::default()).unwrap());
    let bytes = Arc::new(wav_bytes(&noise(0.25, 1.0, 16_000), 16_000, 1));
    let expected = analyzer.analyze(&bytes, "shared").unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let analyzer = Arc::clone(&analyzer);
            let bytes = Arc::clone(&bytes);
            thread::spawn(move || analyzer.analyze(&bytes, "shared").unwrap())
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}

#[tokio::test]
async fn async_analysis_matches_sync() {
    let analyzer = Arc::new(Analyzer::new(AnalyzerConfig::default()).unwrap());
    let bytes = wav_bytes(&sine(480.0, 0.5, 1.0, 16_000), 16_000, 1);
    let sync = analyzer.analyze(&bytes, "async").unwrap();
    let async_report = Arc::clone(&analyzer)
        .analyze_async(bytes, "async".to_string())
        .await
        .unwrap();
    assert_eq!(sync, async_report);
}
