//! Time-lag cross-correlation of feature sequences and peak picking.

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::features::FeatureFrameSequence;

/// Mean-normalized cross-correlation for lags in `[-(L-1), L-1]`,
/// `L = min(a.len(), b.len())`. Index `k` of the returned buffer corresponds
/// to lag `k - (L - 1)`. Each entry is the mean (not the sum) of pairwise
/// products over the lag's overlapping region, so lags near the edges of
/// the buffer aren't unfairly dominated by the fully-overlapping center.
///
/// This is the most expensive loop in the pipeline for long buffers, so the
/// cancellation flag is checked once per lag, same as the per-frame checks
/// in feature extraction.
pub fn cross_correlate(a: &[f64], b: &[f64], cancel: &CancelToken) -> Result<Vec<f64>> {
    let (la, lb) = (a.len(), b.len());
    let l = la.min(lb);
    if l == 0 {
        return Ok(Vec::new());
    }

    let mut out = Vec::with_capacity(2 * l - 1);
    for k in 0..(2 * l - 1) {
        cancel.check()?;
        let lag = k as isize - (l as isize - 1);
        let n_start = (-lag).max(0);
        let n_end = (la as isize).min(lb as isize - lag);

        if n_end <= n_start {
            out.push(0.0);
            continue;
        }

        let mut sum = 0.0;
        let mut count = 0u64;
        let mut n = n_start;
        while n < n_end {
            sum += a[n as usize] * b[(n + lag) as usize];
            count += 1;
            n += 1;
        }
        out.push(if count > 0 { sum / count as f64 } else { 0.0 });
    }
    Ok(out)
}

/// Arithmetic mean across the 12 per-dimension chroma correlation sequences.
pub fn cross_correlate_chroma(
    a: &FeatureFrameSequence,
    b: &FeatureFrameSequence,
    cancel: &CancelToken,
) -> Result<Vec<f64>> {
    let dim = a.dim.min(b.dim);
    let mut series = Vec::with_capacity(dim);
    for d in 0..dim {
        let corr = cross_correlate(&a.dimension_series(d), &b.dimension_series(d), cancel)?;
        series.push((corr, 1.0));
    }
    Ok(combine_running_mean(series.into_iter()))
}

/// Weighted mean across MFCC coefficient correlation sequences, weight
/// `1/(1 + 0.1*k)` for coefficient `k`, combined as a running mean (divide
/// accumulated weighted sum by accumulated weight) so the weights
/// down-weight higher coefficients rather than shrinking the whole scale.
pub fn cross_correlate_mfcc(
    a: &FeatureFrameSequence,
    b: &FeatureFrameSequence,
    include_c0: bool,
    cancel: &CancelToken,
) -> Result<Vec<f64>> {
    let dim = a.dim.min(b.dim);
    let mut series = Vec::with_capacity(dim);
    for k in 0..dim {
        if k == 0 && !include_c0 {
            continue;
        }
        let weight = 1.0 / (1.0 + 0.1 * k as f64);
        let corr = cross_correlate(&a.dimension_series(k), &b.dimension_series(k), cancel)?;
        series.push((corr, weight));
    }
    Ok(combine_running_mean(series.into_iter()))
}

fn combine_running_mean(series: impl Iterator<Item = (Vec<f64>, f64)>) -> Vec<f64> {
    let mut weighted_sum: Vec<f64> = Vec::new();
    let mut total_weight = 0.0;
    for (values, weight) in series {
        if weighted_sum.is_empty() {
            weighted_sum = vec![0.0; values.len()];
        }
        for (acc, v) in weighted_sum.iter_mut().zip(values.iter()) {
            *acc += v * weight;
        }
        total_weight += weight;
    }
    if total_weight > 0.0 {
        for v in weighted_sum.iter_mut() {
            *v /= total_weight;
        }
    }
    weighted_sum
}

/// Result of locating the dominant and secondary peak in a correlation buffer.
#[derive(Debug, Clone, Copy)]
pub struct PeakResult {
    pub peak_index: usize,
    pub peak_value: f64,
    pub secondary_value: Option<f64>,
    pub secondary_peak_ratio: f64,
}

const NO_SECONDARY_SENTINEL: f64 = 1e10;

/// Locate the argmax ("peak") and the largest value at any other index
/// ("secondary"), with no local-window suppression.
pub fn pick_peak(correlation: &[f64]) -> Option<PeakResult> {
    if correlation.is_empty() {
        return None;
    }

    let (peak_index, &peak_value) = correlation
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.abs().partial_cmp(&b.1.abs()).unwrap())?;

    let secondary_value = correlation
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != peak_index)
        .map(|(_, &v)| v.abs())
        .fold(None, |acc: Option<f64>, v| match acc {
            Some(m) if m >= v => Some(m),
            _ => Some(v),
        });

    let secondary_peak_ratio = match secondary_value {
        Some(s) if s > 0.0 => peak_value.abs() / s,
        _ => NO_SECONDARY_SENTINEL,
    };

    Some(PeakResult {
        peak_index,
        peak_value,
        secondary_value,
        secondary_peak_ratio,
    })
}

/// Convert a peak's index in the correlation buffer to a signed sample
/// offset. `ref_len` is the reference feature sequence's frame count;
/// `dim` is the frame dimension (1 for flux/energy, 12 for chroma, N for
/// MFCC) — the centering term divides by it for multi-dimensional features.
pub fn offset_from_peak(peak_index: usize, hop_size: usize, ref_len: usize, dim: usize) -> i64 {
    let dim = dim.max(1);
    let centering = (ref_len as f64 * hop_size as f64 / 2.0) / dim as f64;
    (peak_index as f64 * hop_size as f64 - centering).round() as i64
}
