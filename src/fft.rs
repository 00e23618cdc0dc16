//! Hann-windowed magnitude spectrum over a power-of-two frame size.
//!
//! Twiddle factors are cached per FFT size in an `FftPlanner` kept behind a
//! small size-keyed cache rather than rebuilt per frame.

use crate::error::AlignError;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::collections::HashMap;
use std::sync::Arc;

pub const MIN_FRAME_SIZE: usize = 64;
pub const MAX_FRAME_SIZE: usize = 8_192;
const EPS: f64 = 1e-10;

struct PlannerCache {
    planner: FftPlanner<f64>,
    plans: HashMap<usize, Arc<dyn Fft<f64>>>,
}

static CACHE: Lazy<Mutex<PlannerCache>> = Lazy::new(|| {
    Mutex::new(PlannerCache {
        planner: FftPlanner::new(),
        plans: HashMap::new(),
    })
});

fn plan_for(n: usize) -> Arc<dyn Fft<f64>> {
    let mut cache = CACHE.lock();
    if let Some(plan) = cache.plans.get(&n) {
        return plan.clone();
    }
    let plan = cache.planner.plan_fft_forward(n);
    cache.plans.insert(n, plan.clone());
    plan
}

/// Hann window of length `n`, `w[k] = 0.5 * (1 - cos(2*pi*k/(n-1)))`.
///
/// Cached per size behind the same lock as the FFT plans since both are
/// keyed by frame size and recomputed rarely relative to how often they're
/// read.
static WINDOW_CACHE: Lazy<Mutex<HashMap<usize, Arc<Vec<f64>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

pub fn hann_window(n: usize) -> Arc<Vec<f64>> {
    let mut cache = WINDOW_CACHE.lock();
    if let Some(w) = cache.get(&n) {
        return w.clone();
    }
    let window: Vec<f64> = if n <= 1 {
        vec![1.0; n]
    } else {
        (0..n)
            .map(|k| 0.5 * (1.0 - (2.0 * std::f64::consts::PI * k as f64 / (n - 1) as f64).cos()))
            .collect()
    };
    let window = Arc::new(window);
    cache.insert(n, window.clone());
    window
}

fn validate_frame_size(n: usize) -> Result<(), AlignError> {
    if n == 0 || !n.is_power_of_two() {
        return Err(AlignError::InvalidInput(format!(
            "frame size {n} is not a power of two"
        )));
    }
    if !(MIN_FRAME_SIZE..=MAX_FRAME_SIZE).contains(&n) {
        return Err(AlignError::InvalidInput(format!(
            "frame size {n} outside supported range [{MIN_FRAME_SIZE}, {MAX_FRAME_SIZE}]"
        )));
    }
    Ok(())
}

/// One-sided magnitude spectrum of a Hann-windowed real frame.
///
/// `samples.len()` must equal `n` exactly; `n` must be a power of two in
/// `[64, 8192]`. Returns a vector of length `n/2 + 1`, finite and
/// non-negative.
pub fn magnitude_spectrum(samples: &[f64]) -> Result<Vec<f64>, AlignError> {
    let n = samples.len();
    validate_frame_size(n)?;
    if samples.iter().any(|s| !s.is_finite()) {
        return Err(AlignError::InvalidInput("non-finite sample in frame".into()));
    }

    let window = hann_window(n);
    let mut buf: Vec<Complex<f64>> = samples
        .iter()
        .zip(window.iter())
        .map(|(&s, &w)| Complex::new(s * w, 0.0))
        .collect();

    let fft = plan_for(n);
    fft.process(&mut buf);

    Ok(buf[..n / 2 + 1].iter().map(|c| c.norm()).collect())
}

/// Elementwise square of a magnitude spectrum.
pub fn power_spectrum(magnitude: &[f64]) -> Vec<f64> {
    magnitude.iter().map(|&m| m * m).collect()
}

/// `20*log10(x + eps)`, finite even at `x == 0`.
pub fn to_db_amplitude(x: f64) -> f64 {
    20.0 * (x + EPS).log10()
}

/// `10*log10(x + eps)`, finite even at `x == 0`.
pub fn to_db_power(x: f64) -> f64 {
    10.0 * (x + EPS).log10()
}

/// Frequency in Hz of bin `k` of an `n`-point one-sided spectrum at `sr` Hz.
pub fn bin_frequency(k: usize, n: usize, sr: f64) -> f64 {
    k as f64 * sr / n as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, n: usize, sr: f64) -> Vec<f64> {
        (0..n)
            .map(|i| (2.0 * std::f64::consts::PI * freq * i as f64 / sr).sin())
            .collect()
    }

    #[test]
    fn rejects_non_power_of_two() {
        let err = magnitude_spectrum(&vec![0.0; 100]).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidInput);
    }

    #[test]
    fn rejects_out_of_range_size() {
        assert!(magnitude_spectrum(&vec![0.0; 16]).is_err());
        assert!(magnitude_spectrum(&vec![0.0; 16_384]).is_err());
    }

    #[test]
    fn spectrum_length_and_finiteness_for_all_valid_sizes() {
        let mut n = MIN_FRAME_SIZE;
        while n <= MAX_FRAME_SIZE {
            let frame = sine(440.0, n, 44_100.0);
            let spec = magnitude_spectrum(&frame).unwrap();
            assert_eq!(spec.len(), n / 2 + 1);
            assert!(spec.iter().all(|&v| v.is_finite() && v >= 0.0));
            n *= 2;
        }
    }

    #[test]
    fn sine_peak_within_two_bins() {
        let n = 2048;
        let sr = 44_100.0;
        let freq = 440.0;
        let frame = sine(freq, n, sr);
        let spec = magnitude_spectrum(&frame).unwrap();
        let expected_bin = (freq * n as f64 / sr).round() as usize;
        let peak_bin = spec
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        assert!((peak_bin as i64 - expected_bin as i64).unsigned_abs() <= 2);
    }

    #[test]
    fn silence_has_near_zero_spectrum() {
        let spec = magnitude_spectrum(&vec![0.0; 1024]).unwrap();
        assert!(spec.iter().all(|&v| v.abs() < 1e-6));
    }

    #[test]
    fn db_conversion_finite_at_zero() {
        assert!(to_db_amplitude(0.0).is_finite());
        assert!(to_db_power(0.0).is_finite());
    }
}
