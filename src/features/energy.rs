//! RMS energy profile: one scalar per frame, smoothed and normalized.

use super::{check_cancelled, frame_count, frames, min_max_normalize, validate_frame_params, FeatureFrameSequence};
use crate::cancel::CancelToken;
use crate::error::Result;
use crate::median::median_filter_1d;

pub const SMOOTHING_WINDOW: usize = 5;

fn rms(frame: &[f64]) -> f64 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = frame.iter().map(|s| s * s).sum();
    (sum_sq / frame.len() as f64).sqrt()
}

pub fn extract(samples: &[f64], window: usize, hop: usize, cancel: &CancelToken) -> Result<FeatureFrameSequence> {
    validate_frame_params(window, hop)?;
    let count = frame_count(samples.len(), window, hop);
    if count == 0 {
        return Ok(FeatureFrameSequence {
            frames: Vec::new(),
            dim: 1,
            hop_size: hop,
        });
    }

    let mut raw = Vec::with_capacity(count);
    for frame in frames(samples, window, hop) {
        check_cancelled(cancel)?;
        raw.push(rms(frame));
    }
    let mut smoothed = median_filter_1d(&raw, SMOOTHING_WINDOW);
    min_max_normalize(&mut smoothed);

    Ok(FeatureFrameSequence {
        frames: smoothed.into_iter().map(|v| vec![v.max(0.0)]).collect(),
        dim: 1,
        hop_size: hop,
    })
}
