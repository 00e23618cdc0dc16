//! Three-factor confidence calibrator: correlation strength, peak
//! sharpness, and SNR combine into a single bounded, interpretable score.

use crate::correlate::PeakResult;

/// The three normalized factors behind the published confidence score.
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceFactors {
    pub correlation_strength: f64,
    pub peak_sharpness: f64,
    pub snr: f64,
}

impl ConfidenceFactors {
    /// `0.5*strength + 0.3*sharpness + 0.2*snr`, clamped to `[0, 1]`.
    pub fn confidence(&self) -> f64 {
        (0.5 * self.correlation_strength + 0.3 * self.peak_sharpness + 0.2 * self.snr)
            .clamp(0.0, 1.0)
    }
}

fn rms(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    (values.iter().map(|v| v * v).sum::<f64>() / values.len() as f64).sqrt()
}

fn mean_abs(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|v| v.abs()).sum::<f64>() / values.len() as f64
}

/// Compute the three confidence factors from a correlation buffer and its
/// located peak.
pub fn calibrate(correlation: &[f64], peak: &PeakResult) -> ConfidenceFactors {
    let peak_abs = peak.peak_value.abs();

    let corr_rms = rms(correlation);
    let correlation_strength = if corr_rms > 1e-12 {
        (peak_abs / corr_rms).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let corr_mean_abs = mean_abs(correlation);
    let peak_sharpness = if corr_mean_abs > 1e-12 {
        (peak_abs / corr_mean_abs / 10.0).tanh()
    } else {
        0.0
    };

    let snr = match peak.secondary_value {
        Some(secondary) if secondary > 1e-12 => ((peak_abs / secondary + 1.0).ln() / 3.0).tanh(),
        _ => 1.0,
    };

    ConfidenceFactors {
        correlation_strength,
        peak_sharpness,
        snr,
    }
}

/// Signal-to-noise-ratio estimate in dB: signal = `corr[peak]`, noise =
/// median `|corr[i]|` for `|i - peak| > 10`. Defaults to 40 dB when the
/// exclusion window leaves no samples or the noise estimate is ~0.
pub fn snr_estimate_db(correlation: &[f64], peak_index: usize) -> f64 {
    let mut off_peak: Vec<f64> = correlation
        .iter()
        .enumerate()
        .filter(|&(i, _)| (i as i64 - peak_index as i64).unsigned_abs() > 10)
        .map(|(_, &v)| v.abs())
        .collect();

    if off_peak.is_empty() {
        return 40.0;
    }
    off_peak.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let noise = off_peak[off_peak.len() / 2];
    if noise < 1e-12 {
        return 40.0;
    }

    let signal = correlation.get(peak_index).copied().unwrap_or(0.0).abs();
    20.0 * (signal / noise).log10()
}

/// Noise floor in dB: 10th percentile of `|correlation|`, `eps = 1e-10`.
/// Defaults to -60 dB on empty input.
pub fn noise_floor_db(correlation: &[f64]) -> f64 {
    if correlation.is_empty() {
        return -60.0;
    }
    let mut abs_values: Vec<f64> = correlation.iter().map(|v| v.abs()).collect();
    abs_values.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let idx = ((abs_values.len() as f64 - 1.0) * 0.10).round() as usize;
    20.0 * (abs_values[idx] + 1e-10).log10()
}
