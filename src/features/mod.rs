//! Frame-based feature extraction: spectral flux, chroma, energy, MFCC.
//!
//! All four extractors share the same sliding-window frame loop; each
//! produces a [`FeatureFrameSequence`] whose frame `i` corresponds to the
//! audio sample range `[i*hop, i*hop + window)`.

pub mod chroma;
pub mod energy;
pub mod flux;
pub mod mfcc;

use crate::cancel::CancelToken;
use crate::error::AlignError;

/// An ordered, fixed-dimension sequence of feature frames.
#[derive(Debug, Clone)]
pub struct FeatureFrameSequence {
    /// Row-major: `frames[i]` is the feature vector for frame `i`.
    pub frames: Vec<Vec<f64>>,
    pub dim: usize,
    pub hop_size: usize,
}

impl FeatureFrameSequence {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Scalar-only view (dim == 1), used by flux/energy extractors.
    pub fn as_scalars(&self) -> Vec<f64> {
        self.frames.iter().map(|f| f[0]).collect()
    }

    pub fn dimension_series(&self, dim_idx: usize) -> Vec<f64> {
        self.frames.iter().map(|f| f[dim_idx]).collect()
    }
}

/// Slide a `window`-sized frame across `samples` in steps of `hop`,
/// returning each frame's sample slice. The final partial frame (if any) is
/// dropped.
pub fn frame_count(num_samples: usize, window: usize, hop: usize) -> usize {
    if num_samples < window || hop == 0 {
        0
    } else {
        (num_samples - window) / hop + 1
    }
}

pub(crate) fn frames<'a>(
    samples: &'a [f64],
    window: usize,
    hop: usize,
) -> impl Iterator<Item = &'a [f64]> {
    let count = frame_count(samples.len(), window, hop);
    (0..count).map(move |i| {
        let start = i * hop;
        &samples[start..start + window]
    })
}

/// Checked at the top of every frame-loop iteration in each extractor; a
/// cancelled token surfaces as `AlignError::Cancelled`.
pub(crate) fn check_cancelled(cancel: &CancelToken) -> Result<(), AlignError> {
    cancel.check()
}

pub(crate) fn validate_frame_params(window: usize, hop: usize) -> Result<(), AlignError> {
    if window == 0 || !window.is_power_of_two() {
        return Err(AlignError::InvalidInput(format!(
            "window_size {window} must be a power of two"
        )));
    }
    if hop == 0 || hop > window {
        return Err(AlignError::InvalidInput(format!(
            "hop_size {hop} must be in (0, window_size]"
        )));
    }
    Ok(())
}

/// Min-max normalize a scalar series to `[0, 1]`. All-equal or empty input
/// is left untouched (already within range, avoids a division by zero).
pub(crate) fn min_max_normalize(values: &mut [f64]) {
    if values.is_empty() {
        return;
    }
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if range <= 1e-12 {
        return;
    }
    for v in values.iter_mut() {
        *v = (*v - min) / range;
    }
}
