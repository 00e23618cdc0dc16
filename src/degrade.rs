//! Graceful degradation: when a method fails or resources run low, step
//! down through progressively cheaper strategies instead of aborting.

use crate::config::Config;
use crate::error::{AlignError, ErrorKind};
use crate::method::{Method, FALLBACK_ORDER};
use crate::quality::AudioQualityReport;

/// How far degradation has stepped down from the requested configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DegradationLevel {
    Minimal,
    Moderate,
    Significant,
    Emergency,
}

/// Outcome of one degradation step: the adjusted config and/or method to
/// retry with, plus an estimate of what was given up for it.
#[derive(Debug, Clone)]
pub struct DegradationPlan {
    pub level: DegradationLevel,
    pub config: Config,
    pub method: Method,
    pub expected_confidence_penalty: f64,
    pub expected_speedup: f64,
    pub rationale: String,
}

/// Lower window_size (floor 256) and raise hop_size proportionally.
fn reduce_quality(config: &mut Config) {
    config.window_size = (config.window_size / 2).max(256);
    config.hop_size = (config.hop_size * 2).min(config.window_size);
    config.auto_correct();
}

/// Loosen acceptance criteria so marginal alignments still succeed.
fn adaptive_params(config: &mut Config) {
    config.confidence_threshold = (config.confidence_threshold - 0.15).max(0.3);
    config.noise_gate_db -= 5.0;
}

fn next_fallback_method(current: Method, ref_quality: &AudioQualityReport, tgt_quality: &AudioQualityReport) -> Option<Method> {
    let start = FALLBACK_ORDER.iter().position(|&m| m == current).map(|i| i + 1).unwrap_or(0);
    FALLBACK_ORDER[start..]
        .iter()
        .copied()
        .find(|&m| {
            let compatible = match m {
                Method::Chroma => {
                    ref_quality.spectral_centroid_hz > 200.0 && tgt_quality.spectral_centroid_hz > 200.0
                }
                Method::Mfcc => !ref_quality.has_excessive_clipping && !tgt_quality.has_excessive_clipping,
                Method::Hybrid => {
                    ref_quality.has_sufficient_content && tgt_quality.has_sufficient_content
                }
                _ => true,
            };
            compatible && ref_quality.sufficient_for(m) && tgt_quality.sufficient_for(m)
        })
}

/// Build the next degradation step for a failed alignment attempt.
///
/// Trigger ordering follows the error kind: out-of-memory tries reducing
/// quality first (cheapest to recover from), then a fallback method;
/// processing failures try a fallback method before loosening parameters;
/// insufficient data loosens parameters and falls back before giving up.
pub fn next_step(
    error: &AlignError,
    current_level: DegradationLevel,
    current_method: Method,
    config: &Config,
    ref_quality: &AudioQualityReport,
    tgt_quality: &AudioQualityReport,
) -> Option<DegradationPlan> {
    if current_level == DegradationLevel::Emergency {
        return None;
    }

    let next_level = match current_level {
        DegradationLevel::Minimal => DegradationLevel::Moderate,
        DegradationLevel::Moderate => DegradationLevel::Significant,
        DegradationLevel::Significant => DegradationLevel::Emergency,
        DegradationLevel::Emergency => unreachable!(),
    };

    let mut plan_config = config.clone();
    let (method, rationale) = match error.kind() {
        ErrorKind::OutOfMemory => {
            reduce_quality(&mut plan_config);
            match next_fallback_method(current_method, ref_quality, tgt_quality) {
                Some(m) if next_level >= DegradationLevel::Significant => {
                    (m, format!("out of memory: reduced window size and fell back to {}", m.name()))
                }
                _ => (current_method, "out of memory: reduced window size and precision".to_string()),
            }
        }
        ErrorKind::ProcessingFailed => match next_fallback_method(current_method, ref_quality, tgt_quality) {
            Some(m) => (m, format!("processing failed: falling back to {}", m.name())),
            None => {
                adaptive_params(&mut plan_config);
                reduce_quality(&mut plan_config);
                (current_method, "processing failed: loosened thresholds and reduced quality".to_string())
            }
        },
        ErrorKind::InsufficientData => {
            adaptive_params(&mut plan_config);
            match next_fallback_method(current_method, ref_quality, tgt_quality) {
                Some(m) if next_level >= DegradationLevel::Moderate => {
                    (m, format!("insufficient data: adapted parameters and fell back to {}", m.name()))
                }
                _ => {
                    reduce_quality(&mut plan_config);
                    (current_method, "insufficient data: adapted parameters and reduced quality".to_string())
                }
            }
        }
        _ => return None,
    };

    let expected_confidence_penalty = match next_level {
        DegradationLevel::Moderate => 0.1,
        DegradationLevel::Significant => 0.2,
        DegradationLevel::Emergency => 0.35,
        DegradationLevel::Minimal => 0.0,
    };
    let expected_speedup = match next_level {
        DegradationLevel::Moderate => 1.5,
        DegradationLevel::Significant => 2.5,
        DegradationLevel::Emergency => 4.0,
        DegradationLevel::Minimal => 1.0,
    };

    Some(DegradationPlan {
        level: next_level,
        config: plan_config,
        method,
        expected_confidence_penalty,
        expected_speedup,
        rationale,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::analyze;

    fn good_quality() -> AudioQualityReport {
        let samples: Vec<f32> = (0..44_100 * 4)
            .map(|i| ((i as f64 * 0.05).sin() * 0.5) as f32)
            .collect();
        analyze(&samples, 44_100)
    }

    #[test]
    fn oom_reduces_window_size_first() {
        let config = Config::default();
        let q = good_quality();
        let err = AlignError::OutOfMemory("too big".into());
        let plan = next_step(&err, DegradationLevel::Minimal, Method::Mfcc, &config, &q, &q).unwrap();
        assert!(plan.config.window_size < config.window_size);
        assert_eq!(plan.level, DegradationLevel::Moderate);
    }

    #[test]
    fn processing_failed_tries_fallback_method() {
        let config = Config::default();
        let q = good_quality();
        let err = AlignError::ProcessingFailed("no peak".into());
        let plan = next_step(&err, DegradationLevel::Minimal, Method::SpectralFlux, &config, &q, &q).unwrap();
        assert_ne!(plan.method, Method::SpectralFlux);
    }

    #[test]
    fn emergency_level_has_no_further_step() {
        let config = Config::default();
        let q = good_quality();
        let err = AlignError::ProcessingFailed("still failing".into());
        assert!(next_step(&err, DegradationLevel::Emergency, Method::Hybrid, &config, &q, &q).is_none());
    }

    #[test]
    fn insufficient_data_loosens_thresholds() {
        let config = Config::default();
        let q = good_quality();
        let err = AlignError::InsufficientData("too short".into());
        let plan = next_step(&err, DegradationLevel::Minimal, Method::Chroma, &config, &q, &q).unwrap();
        assert!(plan.config.confidence_threshold <= config.confidence_threshold);
    }
}
