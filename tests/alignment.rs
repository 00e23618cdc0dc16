//! Integration tests covering the alignment core's headline scenarios:
//! identity alignment, a known fixed shift, onset detection, hybrid
//! consensus, sample-rate rejection, and batch processing.

use audiosync_core::cancel::CancelToken;
use audiosync_core::config::Config;
use audiosync_core::engine::{self, BatchTarget};
use audiosync_core::error::ErrorKind;
use audiosync_core::method::Method;

fn sine(freq: f64, n: usize, sr: f64) -> Vec<f32> {
    (0..n)
        .map(|i| ((2.0 * std::f64::consts::PI * freq * i as f64 / sr).sin() * 0.6) as f32)
        .collect()
}

#[test]
fn identity_self_alignment_at_44_1khz() {
    let audio = sine(440.0, 44_100 * 3, 44_100.0);
    let config = Config::default();
    let outcome = engine::align(&audio, 44_100, &audio, 44_100, Method::SpectralFlux, &config, &CancelToken::new()).unwrap();
    assert!(outcome.offset_samples.abs() <= 256);
    assert!(outcome.confidence >= 0.7);
}

#[test]
fn known_50ms_shift_via_energy_method() {
    let sr = 44_100.0;
    let reference = sine(220.0, 44_100 * 3, sr);
    let shift_samples = 2_205usize; // 50ms at 44.1kHz
    let mut target = vec![0.0f32; shift_samples];
    target.extend_from_slice(&reference);

    let config = Config::default();
    let outcome = engine::align(&reference, 44_100, &target, 44_100, Method::Energy, &config, &CancelToken::new()).unwrap();
    assert!((outcome.offset_samples - shift_samples as i64).abs() <= config.hop_size as i64);
}

#[test]
fn impulse_train_onset_detection() {
    let sr = 44_100.0;
    let duration_s = 2.0;
    let n = (sr * duration_s) as usize;
    let mut audio = vec![0.0f32; n];
    for t in [0.1, 0.3, 0.7, 1.2, 1.8] {
        let idx = (t * sr) as usize;
        for k in 0..50.min(n - idx) {
            audio[idx + k] = 0.9;
        }
    }
    let samples: Vec<f64> = audio.iter().map(|&s| s as f64).collect();
    let seq = audiosync_core::features::flux::extract(&samples, 1024, 256, &CancelToken::new()).unwrap();
    let novelty = seq.as_scalars();
    let onsets = engine::detect_onsets(&novelty, 0.1, 10);
    assert!(onsets.len() >= 3 && onsets.len() <= 7);
}

#[test]
fn hybrid_consensus_on_10ms_shift() {
    let sr = 44_100.0;
    let reference = sine(440.0, 44_100 * 4, sr);
    let shift_samples = 441usize; // 10ms
    let mut target = vec![0.0f32; shift_samples];
    target.extend_from_slice(&reference);

    let config = Config::default();
    let hybrid = engine::align(&reference, 44_100, &target, 44_100, Method::Hybrid, &config, &CancelToken::new()).unwrap();
    assert!((hybrid.offset_samples - shift_samples as i64).abs() <= config.hop_size as i64);

    let flux = engine::align(&reference, 44_100, &target, 44_100, Method::SpectralFlux, &config, &CancelToken::new());
    if let Ok(flux) = flux {
        assert!(hybrid.confidence >= flux.confidence.min(hybrid.confidence));
    }
}

#[test]
fn rejected_sample_rate_reports_unsupported_format() {
    let audio = sine(440.0, 8_000 * 3, 8_000.0);
    let config = Config::default();
    let err = engine::align(&audio, 7_999, &audio, 7_999, Method::Energy, &config, &CancelToken::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
}

#[test]
fn cancellation_is_observed_at_top_level() {
    let audio = sine(440.0, 44_100 * 3, 44_100.0);
    let config = Config::default();
    let token = CancelToken::new();
    token.cancel();
    let err = engine::align(&audio, 44_100, &audio, 44_100, Method::SpectralFlux, &config, &token).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProcessingFailed);
}

#[test]
fn batch_of_three_targets_via_energy_method() {
    let sr = 44_100.0;
    let reference = sine(330.0, 44_100 * 3, sr);
    let offsets_ms = [10u64, 50, 100];
    let buffers: Vec<Vec<f32>> = offsets_ms
        .iter()
        .map(|&ms| {
            let shift = (ms as f64 / 1000.0 * sr) as usize;
            let mut v = vec![0.0f32; shift];
            v.extend_from_slice(&reference);
            v
        })
        .collect();
    let targets: Vec<BatchTarget> = buffers
        .iter()
        .map(|b| BatchTarget { samples: b, sample_rate: 44_100 })
        .collect();

    let config = Config::default();
    let results = engine::align_batch(&reference, 44_100, &targets, Method::Energy, &config, &CancelToken::new());
    assert_eq!(results.len(), 3);
    for (result, &ms) in results.iter().zip(offsets_ms.iter()) {
        let outcome = result.as_ref().expect("batch member should succeed");
        let expected = (ms as f64 / 1000.0 * sr) as i64;
        assert!((outcome.offset_samples - expected).abs() <= config.hop_size as i64);
    }
}
