//! The alignment pipeline: validate -> extract -> correlate -> peak ->
//! calibrate, per method, plus hybrid consensus, batch processing, onset
//! detection, and the long-lived engine handle used by the FFI layer.

use rayon::prelude::*;

use crate::cancel::CancelToken;
use crate::config::Config;
use crate::confidence::{calibrate, noise_floor_db, snr_estimate_db};
use crate::correlate::{cross_correlate, cross_correlate_chroma, cross_correlate_mfcc, offset_from_peak, pick_peak};
use crate::degrade::{next_step, DegradationLevel};
use crate::error::{AlignError, Result};
use crate::features::{chroma, energy, flux, mfcc};
use crate::method::{Method, ALL_PRIMARY_METHODS};
use crate::quality::{self, AudioBufferRef};

/// Outcome of a single successful alignment.
#[derive(Debug, Clone)]
pub struct AlignmentOutcome {
    pub offset_samples: i64,
    pub confidence: f64,
    pub method: Method,
    pub peak_correlation: f64,
    pub snr_db: f64,
    pub noise_floor_db: f64,
    pub secondary_peak_ratio: f64,
    pub degradation_level: DegradationLevel,
}

fn to_f64(samples: &[f32]) -> Vec<f64> {
    samples.iter().map(|&s| s as f64).collect()
}

fn scalar_align(
    ref_features: &[f64],
    tgt_features: &[f64],
    hop_size: usize,
    dim: usize,
    method: Method,
    cancel: &CancelToken,
) -> Result<AlignmentOutcome> {
    let corr = cross_correlate(ref_features, tgt_features, cancel)?;
    let peak = pick_peak(&corr)
        .ok_or_else(|| AlignError::ProcessingFailed(format!("{}: no correlation peak found", method.name())))?;

    let factors = calibrate(&corr, &peak);
    let offset_samples = offset_from_peak(peak.peak_index, hop_size, ref_features.len(), dim);

    Ok(AlignmentOutcome {
        offset_samples,
        confidence: factors.confidence(),
        method,
        peak_correlation: peak.peak_value,
        snr_db: snr_estimate_db(&corr, peak.peak_index),
        noise_floor_db: noise_floor_db(&corr),
        secondary_peak_ratio: peak.secondary_peak_ratio,
        degradation_level: DegradationLevel::Minimal,
    })
}

pub fn align_flux(reference: &[f64], target: &[f64], config: &Config, cancel: &CancelToken) -> Result<AlignmentOutcome> {
    let ref_seq = flux::extract(reference, config.window_size as usize, config.hop_size as usize, cancel)?;
    let tgt_seq = flux::extract(target, config.window_size as usize, config.hop_size as usize, cancel)?;
    if ref_seq.is_empty() || tgt_seq.is_empty() {
        return Err(AlignError::InsufficientData("flux extraction produced no frames".into()));
    }
    scalar_align(&ref_seq.as_scalars(), &tgt_seq.as_scalars(), config.hop_size as usize, 1, Method::SpectralFlux, cancel)
}

pub fn align_energy(reference: &[f64], target: &[f64], config: &Config, cancel: &CancelToken) -> Result<AlignmentOutcome> {
    let ref_seq = energy::extract(reference, config.window_size as usize, config.hop_size as usize, cancel)?;
    let tgt_seq = energy::extract(target, config.window_size as usize, config.hop_size as usize, cancel)?;
    if ref_seq.is_empty() || tgt_seq.is_empty() {
        return Err(AlignError::InsufficientData("energy extraction produced no frames".into()));
    }
    scalar_align(&ref_seq.as_scalars(), &tgt_seq.as_scalars(), config.hop_size as usize, 1, Method::Energy, cancel)
}

pub fn align_chroma(reference: &[f64], target: &[f64], sample_rate: u32, config: &Config, cancel: &CancelToken) -> Result<AlignmentOutcome> {
    let window = config.window_size as usize;
    let hop = config.hop_size as usize;
    let ref_seq = chroma::extract(reference, sample_rate as f64, window, hop, cancel)?;
    let tgt_seq = chroma::extract(target, sample_rate as f64, window, hop, cancel)?;
    if ref_seq.is_empty() || tgt_seq.is_empty() {
        return Err(AlignError::InsufficientData("chroma extraction produced no frames".into()));
    }

    let corr = cross_correlate_chroma(&ref_seq, &tgt_seq, cancel)?;
    let peak = pick_peak(&corr).ok_or_else(|| AlignError::ProcessingFailed("chroma: no correlation peak found".into()))?;
    let factors = calibrate(&corr, &peak);
    let offset_samples = offset_from_peak(peak.peak_index, hop, ref_seq.len(), ref_seq.dim);

    Ok(AlignmentOutcome {
        offset_samples,
        confidence: factors.confidence(),
        method: Method::Chroma,
        peak_correlation: peak.peak_value,
        snr_db: snr_estimate_db(&corr, peak.peak_index),
        noise_floor_db: noise_floor_db(&corr),
        secondary_peak_ratio: peak.secondary_peak_ratio,
        degradation_level: DegradationLevel::Minimal,
    })
}

pub fn align_mfcc(reference: &[f64], target: &[f64], sample_rate: u32, config: &Config, cancel: &CancelToken) -> Result<AlignmentOutcome> {
    let window = config.window_size as usize;
    let hop = config.hop_size as usize;
    let mfcc_config = mfcc::MfccConfig {
        num_mel_filters: config.num_mel_filters as usize,
        num_coeffs: config.num_mfcc_coeffs as usize,
        include_c0: config.include_c0,
    };
    let ref_seq = mfcc::extract(reference, sample_rate as f64, window, hop, &mfcc_config, cancel)?;
    let tgt_seq = mfcc::extract(target, sample_rate as f64, window, hop, &mfcc_config, cancel)?;
    if ref_seq.is_empty() || tgt_seq.is_empty() {
        return Err(AlignError::InsufficientData("mfcc extraction produced no frames".into()));
    }

    let corr = cross_correlate_mfcc(&ref_seq, &tgt_seq, config.include_c0, cancel)?;
    let peak = pick_peak(&corr).ok_or_else(|| AlignError::ProcessingFailed("mfcc: no correlation peak found".into()))?;
    let factors = calibrate(&corr, &peak);
    let offset_samples = offset_from_peak(peak.peak_index, hop, ref_seq.len(), ref_seq.dim);

    Ok(AlignmentOutcome {
        offset_samples,
        confidence: factors.confidence(),
        method: Method::Mfcc,
        peak_correlation: peak.peak_value,
        snr_db: snr_estimate_db(&corr, peak.peak_index),
        noise_floor_db: noise_floor_db(&corr),
        secondary_peak_ratio: peak.secondary_peak_ratio,
        degradation_level: DegradationLevel::Minimal,
    })
}

/// Run every primary method that succeeds and combine the results by
/// confidence-weighted average offset. `secondary_peak_ratio` and
/// `peak_correlation` are unweighted means across the contributors. Fails
/// only if all four primary methods fail.
pub fn align_hybrid(reference: &[f64], target: &[f64], sample_rate: u32, config: &Config, cancel: &CancelToken) -> Result<AlignmentOutcome> {
    let attempts: Vec<Result<AlignmentOutcome>> = vec![
        align_flux(reference, target, config, cancel),
        align_chroma(reference, target, sample_rate, config, cancel),
        align_energy(reference, target, config, cancel),
        align_mfcc(reference, target, sample_rate, config, cancel),
    ];

    let successes: Vec<AlignmentOutcome> = attempts.into_iter().filter_map(|r| r.ok()).collect();
    if successes.is_empty() {
        return Err(AlignError::ProcessingFailed(
            "hybrid: all primary methods failed".into(),
        ));
    }

    let total_weight: f64 = successes.iter().map(|o| o.confidence.max(1e-6)).sum();
    let weighted_offset: f64 = successes
        .iter()
        .map(|o| o.offset_samples as f64 * o.confidence.max(1e-6))
        .sum::<f64>()
        / total_weight;
    let weighted_confidence: f64 = successes.iter().map(|o| o.confidence * o.confidence.max(1e-6)).sum::<f64>() / total_weight;
    let mean_snr = successes.iter().map(|o| o.snr_db).sum::<f64>() / successes.len() as f64;
    let mean_noise_floor = successes.iter().map(|o| o.noise_floor_db).sum::<f64>() / successes.len() as f64;
    let mean_secondary_ratio = successes.iter().map(|o| o.secondary_peak_ratio).sum::<f64>() / successes.len() as f64;
    let mean_peak_correlation = successes.iter().map(|o| o.peak_correlation).sum::<f64>() / successes.len() as f64;

    Ok(AlignmentOutcome {
        offset_samples: weighted_offset.round() as i64,
        confidence: weighted_confidence.clamp(0.0, 1.0),
        method: Method::Hybrid,
        peak_correlation: mean_peak_correlation,
        snr_db: mean_snr,
        noise_floor_db: mean_noise_floor,
        secondary_peak_ratio: mean_secondary_ratio,
        degradation_level: DegradationLevel::Minimal,
    })
}

fn dispatch(
    method: Method,
    reference: &[f64],
    target: &[f64],
    sample_rate: u32,
    config: &Config,
    cancel: &CancelToken,
) -> Result<AlignmentOutcome> {
    match method {
        Method::SpectralFlux => align_flux(reference, target, config, cancel),
        Method::Chroma => align_chroma(reference, target, sample_rate, config, cancel),
        Method::Energy => align_energy(reference, target, config, cancel),
        Method::Mfcc => align_mfcc(reference, target, sample_rate, config, cancel),
        Method::Hybrid => align_hybrid(reference, target, sample_rate, config, cancel),
    }
}

/// Validate, align, and on failure step through graceful degradation until
/// success or the degradation ladder is exhausted. A result whose confidence
/// falls below `config.confidence_threshold` is treated the same as a
/// dispatch failure: it feeds back into degradation rather than returning.
pub fn align(
    reference: &[f32],
    ref_sample_rate: u32,
    target: &[f32],
    tgt_sample_rate: u32,
    method: Method,
    config: &Config,
    cancel: &CancelToken,
) -> Result<AlignmentOutcome> {
    quality::validate_pair(
        AudioBufferRef { samples: reference, sample_rate: ref_sample_rate },
        AudioBufferRef { samples: target, sample_rate: tgt_sample_rate },
        method,
    )?;

    let ref_quality = quality::analyze(reference, ref_sample_rate);
    let tgt_quality = quality::analyze(target, tgt_sample_rate);

    let ref_f64 = to_f64(reference);
    let tgt_f64 = to_f64(target);

    let mut current_method = method;
    let mut current_config = config.clone();
    let mut level = DegradationLevel::Minimal;

    loop {
        let outcome = dispatch(current_method, &ref_f64, &tgt_f64, ref_sample_rate, &current_config, cancel).and_then(|outcome| {
            if outcome.confidence < current_config.confidence_threshold {
                Err(AlignError::ProcessingFailed(format!(
                    "{}: confidence {:.3} below threshold {:.3}",
                    current_method.name(),
                    outcome.confidence,
                    current_config.confidence_threshold
                )))
            } else {
                Ok(outcome)
            }
        });

        match outcome {
            Ok(mut outcome) => {
                outcome.degradation_level = level;
                return Ok(outcome);
            }
            Err(err @ AlignError::Cancelled(_)) => return Err(err),
            Err(err) => {
                crate::logging::record(crate::error::Severity::Warn, err.kind(), "engine::align", "engine.rs", err.suggestion());
                match next_step(&err, level, current_method, &current_config, &ref_quality, &tgt_quality) {
                    Some(plan) => {
                        level = plan.level;
                        current_config = plan.config;
                        current_method = plan.method;
                    }
                    None => return Err(err),
                }
            }
        }
    }
}

/// One batch entry: a target buffer aligned against a shared reference.
pub struct BatchTarget<'a> {
    pub samples: &'a [f32],
    pub sample_rate: u32,
}

/// Align each target against `reference` independently and in parallel. All
/// targets share one cancellation token: cancelling once aborts the whole
/// batch. A single target's failure does not affect the others.
pub fn align_batch(
    reference: &[f32],
    ref_sample_rate: u32,
    targets: &[BatchTarget<'_>],
    method: Method,
    config: &Config,
    cancel: &CancelToken,
) -> Vec<Result<AlignmentOutcome>> {
    targets
        .par_iter()
        .map(|t| align(reference, ref_sample_rate, t.samples, t.sample_rate, method, config, cancel))
        .collect()
}

/// A detected onset in a spectral-flux-like novelty curve.
#[derive(Debug, Clone, Copy)]
pub struct Onset {
    pub frame_index: usize,
    pub strength: f64,
}

/// Pick onsets from a novelty curve: above `threshold`, above the local
/// mean over `local_window` frames, a strict local maximum, and at least
/// `local_window / 2` frames from any stronger onset already kept.
pub fn detect_onsets(novelty: &[f64], threshold: f64, local_window: usize) -> Vec<Onset> {
    let n = novelty.len();
    if n == 0 {
        return Vec::new();
    }
    let half = local_window / 2;

    let mut candidates: Vec<Onset> = Vec::new();
    for i in 0..n {
        let value = novelty[i];
        if value < threshold {
            continue;
        }
        let lo = i.saturating_sub(half);
        let hi = (i + half + 1).min(n);
        let local_mean = novelty[lo..hi].iter().sum::<f64>() / (hi - lo) as f64;
        if value < local_mean {
            continue;
        }
        let is_strict_max = (lo..hi).all(|j| j == i || novelty[j] < value);
        if !is_strict_max {
            continue;
        }
        candidates.push(Onset { frame_index: i, strength: value });
    }

    candidates.sort_by(|a, b| b.strength.partial_cmp(&a.strength).unwrap());
    let mut kept: Vec<Onset> = Vec::new();
    for c in candidates {
        if kept.iter().all(|k: &Onset| k.frame_index.abs_diff(c.frame_index) >= half) {
            kept.push(c);
        }
    }
    kept.sort_by_key(|o| o.frame_index);
    kept
}

/// Long-lived handle wrapping a fixed configuration, for callers that align
/// many pairs without re-validating configuration each time.
pub struct EngineHandle {
    config: Config,
}

impl EngineHandle {
    pub fn new(config: Config) -> Result<EngineHandle> {
        config.validate()?;
        Ok(EngineHandle { config })
    }

    pub fn set_config(&mut self, config: Config) -> Result<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Convenience entry point matching the simplified ABI `process` call,
    /// which has no sample-rate parameter. Assumes 44100 Hz and spectral
    /// flux, a placeholder the full `align`/`align_batch` entry points
    /// should be preferred over once a caller can supply real metadata.
    pub fn process(&self, reference: &[f32], target: &[f32], cancel: &CancelToken) -> Result<AlignmentOutcome> {
        align(reference, 44_100, target, 44_100, Method::SpectralFlux, &self.config, cancel)
    }
}
