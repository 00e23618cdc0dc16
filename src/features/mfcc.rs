//! Mel-Frequency Cepstral Coefficients: magnitude spectrum -> triangular mel
//! filterbank -> log -> truncated DCT-II.

use super::{check_cancelled, frame_count, frames, validate_frame_params, FeatureFrameSequence};
use crate::cancel::CancelToken;
use crate::error::Result;
use crate::fft::magnitude_spectrum;

pub const DEFAULT_NUM_MEL_FILTERS: usize = 26;
pub const DEFAULT_NUM_COEFFS: usize = 13;
const LOG_EPS: f64 = 1e-10;

fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10f64.powf(mel / 2595.0) - 1.0)
}

/// Triangular mel filterbank, `num_filters` rows x `spectrum_len` columns.
pub fn mel_filterbank(num_filters: usize, spectrum_len: usize, sr: f64) -> Vec<Vec<f64>> {
    let n_fft = (spectrum_len - 1) * 2;
    let mel_min = hz_to_mel(0.0);
    let mel_max = hz_to_mel(sr / 2.0);
    let mel_points: Vec<f64> = (0..num_filters + 2)
        .map(|i| mel_min + (mel_max - mel_min) * i as f64 / (num_filters + 1) as f64)
        .collect();
    let bin_points: Vec<usize> = mel_points
        .iter()
        .map(|&m| ((mel_to_hz(m) * n_fft as f64 / sr).floor() as usize).min(spectrum_len - 1))
        .collect();

    let mut filters = vec![vec![0.0; spectrum_len]; num_filters];
    for m in 0..num_filters {
        let (left, center, right) = (bin_points[m], bin_points[m + 1], bin_points[m + 2]);
        for k in left..center {
            if center > left {
                filters[m][k] = (k - left) as f64 / (center - left) as f64;
            }
        }
        for k in center..right {
            if right > center {
                filters[m][k] = (right - k) as f64 / (right - center) as f64;
            }
        }
    }
    filters
}

/// DCT-II of `input`, truncated to `num_coeffs` outputs.
fn dct2(input: &[f64], num_coeffs: usize) -> Vec<f64> {
    let n = input.len();
    let mut out = Vec::with_capacity(num_coeffs);
    for k in 0..num_coeffs {
        let mut sum = 0.0;
        for (i, &x) in input.iter().enumerate() {
            sum += x * (std::f64::consts::PI * k as f64 * (2.0 * i as f64 + 1.0) / (2.0 * n as f64)).cos();
        }
        out.push(sum);
    }
    out
}

pub struct MfccConfig {
    pub num_mel_filters: usize,
    pub num_coeffs: usize,
    pub include_c0: bool,
}

impl Default for MfccConfig {
    fn default() -> Self {
        Self {
            num_mel_filters: DEFAULT_NUM_MEL_FILTERS,
            num_coeffs: DEFAULT_NUM_COEFFS,
            include_c0: true,
        }
    }
}

pub fn extract(
    samples: &[f64],
    sr: f64,
    window: usize,
    hop: usize,
    config: &MfccConfig,
    cancel: &CancelToken,
) -> Result<FeatureFrameSequence> {
    validate_frame_params(window, hop)?;
    let count = frame_count(samples.len(), window, hop);
    if count == 0 {
        return Ok(FeatureFrameSequence {
            frames: Vec::new(),
            dim: config.num_coeffs,
            hop_size: hop,
        });
    }

    let spectrum_len = window / 2 + 1;
    let bank = mel_filterbank(config.num_mel_filters, spectrum_len, sr);

    let mut out = Vec::with_capacity(count);
    for frame in frames(samples, window, hop) {
        check_cancelled(cancel)?;
        let mag = magnitude_spectrum(frame)?;
        let log_mel: Vec<f64> = bank
            .iter()
            .map(|filter| {
                let energy: f64 = filter.iter().zip(mag.iter()).map(|(f, m)| f * m).sum();
                (energy + LOG_EPS).ln()
            })
            .collect();

        let mut coeffs = dct2(&log_mel, config.num_coeffs);
        if !config.include_c0 && !coeffs.is_empty() {
            coeffs[0] = 0.0;
        }
        out.push(coeffs);
    }

    Ok(FeatureFrameSequence {
        frames: out,
        dim: config.num_coeffs,
        hop_size: hop,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_produces_finite_coefficients() {
        let audio = vec![0.0; 44_100 * 3];
        let seq = extract(&audio, 44_100.0, 2048, 512, &MfccConfig::default(), &CancelToken::new()).unwrap();
        assert!(seq
            .frames
            .iter()
            .all(|f| f.iter().all(|v| v.is_finite())));
    }

    #[test]
    fn coefficient_count_matches_config() {
        let audio: Vec<f64> = (0..44_100 * 3)
            .map(|i| (i as f64 * 0.02).sin() * 0.4)
            .collect();
        let cfg = MfccConfig {
            num_coeffs: 10,
            ..Default::default()
        };
        let seq = extract(&audio, 44_100.0, 2048, 512, &cfg, &CancelToken::new()).unwrap();
        assert!(seq.frames.iter().all(|f| f.len() == 10));
    }

    #[test]
    fn exclude_c0_zeroes_first_coefficient() {
        let audio: Vec<f64> = (0..44_100 * 3)
            .map(|i| (i as f64 * 0.02).sin() * 0.4)
            .collect();
        let cfg = MfccConfig {
            include_c0: false,
            ..Default::default()
        };
        let seq = extract(&audio, 44_100.0, 2048, 512, &cfg, &CancelToken::new()).unwrap();
        assert!(seq.frames.iter().all(|f| f[0] == 0.0));
    }

    #[test]
    fn cancellation_is_observed() {
        let audio: Vec<f64> = (0..44_100 * 3)
            .map(|i| (i as f64 * 0.02).sin() * 0.4)
            .collect();
        let token = CancelToken::new();
        token.cancel();
        let err = extract(&audio, 44_100.0, 2048, 512, &MfccConfig::default(), &token).unwrap_err();
        assert!(matches!(err, crate::error::AlignError::Cancelled(_)));
    }

    #[test]
    fn filterbank_rows_are_non_negative() {
        let bank = mel_filterbank(26, 1025, 44_100.0);
        assert_eq!(bank.len(), 26);
        for row in &bank {
            assert!(row.iter().all(|&v| v >= 0.0));
        }
    }
}
