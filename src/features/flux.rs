//! Spectral flux: half-wave-rectified L1 difference between successive
//! magnitude spectra, a detector of onsets.
//!
//! Pipeline: raw flux -> adaptive threshold (percentile subtract, clamp at
//! zero) -> median smooth -> min-max normalize.

use super::{check_cancelled, frame_count, frames, min_max_normalize, validate_frame_params, FeatureFrameSequence};
use crate::cancel::CancelToken;
use crate::error::{AlignError, Result};
use crate::fft::magnitude_spectrum;
use crate::median::median_filter_1d;

pub const DEFAULT_MEDIAN_FILTER_SIZE: usize = 3;
pub const DEFAULT_PERCENTILE: f64 = 0.10;

/// Raw (unsmoothed, unthresholded) spectral flux per frame, excluding DC.
pub fn raw_flux(samples: &[f64], window: usize, hop: usize, cancel: &CancelToken) -> Result<Vec<f64>> {
    validate_frame_params(window, hop)?;
    let count = frame_count(samples.len(), window, hop);
    if count == 0 {
        return Ok(Vec::new());
    }

    let mut prev: Option<Vec<f64>> = None;
    let mut flux = Vec::with_capacity(count);
    for frame in frames(samples, window, hop) {
        check_cancelled(cancel)?;
        let mag = magnitude_spectrum(frame)?;
        let value = match &prev {
            None => 0.0,
            Some(p) => mag
                .iter()
                .zip(p.iter())
                .skip(1) // exclude DC bin
                .map(|(&cur, &p)| (cur - p).max(0.0))
                .sum(),
        };
        flux.push(value);
        prev = Some(mag);
    }
    Ok(flux)
}

/// Subtract the `percentile`-th percentile of `values` and clamp at zero.
pub fn adaptive_threshold(values: &[f64], percentile: f64) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let idx = ((sorted.len() as f64 - 1.0) * percentile.clamp(0.0, 1.0)).round() as usize;
    let threshold = sorted[idx];
    values.iter().map(|&v| (v - threshold).max(0.0)).collect()
}

/// Extract the full spectral-flux feature sequence for one buffer.
pub fn extract(samples: &[f64], window: usize, hop: usize, cancel: &CancelToken) -> Result<FeatureFrameSequence> {
    let flux = raw_flux(samples, window, hop, cancel)?;
    if flux.is_empty() {
        return Ok(FeatureFrameSequence {
            frames: Vec::new(),
            dim: 1,
            hop_size: hop,
        });
    }

    let mut thresholded = adaptive_threshold(&flux, DEFAULT_PERCENTILE);
    let smoothed = median_filter_1d(&thresholded, DEFAULT_MEDIAN_FILTER_SIZE);
    thresholded.copy_from_slice(&smoothed);
    min_max_normalize(&mut thresholded);

    if thresholded.iter().any(|v| !v.is_finite()) {
        return Err(AlignError::ProcessingFailed(
            "spectral flux produced a non-finite frame".into(),
        ));
    }

    Ok(FeatureFrameSequence {
        frames: thresholded.into_iter().map(|v| vec![v]).collect(),
        dim: 1,
        hop_size: hop,
    })
}
