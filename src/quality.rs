//! Input validation and audio-quality analysis.
//!
//! Gates every alignment call (buffer validity, sample-rate agreement,
//! minimum method-specific duration) and characterizes audio quality for
//! advisory reporting and graceful degradation.

use crate::error::{AlignError, Result};
use crate::fft::{bin_frequency, magnitude_spectrum};
use crate::method::Method;

pub const MIN_SAMPLES: usize = 1_024;
pub const MAX_SAMPLES: usize = 10_000_000;
pub const MIN_SAMPLE_RATE: u32 = 8_000;
pub const MAX_SAMPLE_RATE: u32 = 192_000;
const SILENCE_THRESHOLD_DB: f64 = -40.0;
const CLIPPING_THRESHOLD: f64 = 0.99;

/// A borrowed, not-yet-validated mono audio buffer.
#[derive(Debug, Clone, Copy)]
pub struct AudioBufferRef<'a> {
    pub samples: &'a [f32],
    pub sample_rate: u32,
}

/// Reject a single buffer for nullness (handled by the FFI layer before
/// constructing this type), non-finite samples, or an out-of-range sample
/// count / sample rate.
pub fn validate_buffer(buf: AudioBufferRef<'_>) -> Result<()> {
    if buf.samples.len() < MIN_SAMPLES || buf.samples.len() > MAX_SAMPLES {
        return Err(AlignError::InvalidInput(format!(
            "sample count {} outside [{MIN_SAMPLES}, {MAX_SAMPLES}]",
            buf.samples.len()
        )));
    }
    if buf.samples.iter().any(|s| !s.is_finite()) {
        return Err(AlignError::InvalidInput("buffer contains non-finite samples".into()));
    }
    if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&buf.sample_rate) {
        return Err(AlignError::UnsupportedFormat(format!(
            "sample rate {} outside [{MIN_SAMPLE_RATE}, {MAX_SAMPLE_RATE}]",
            buf.sample_rate
        )));
    }
    Ok(())
}

/// Gate for every alignment call: both buffers individually valid, both
/// non-empty (covered by `validate_buffer`), sample rates agree within 1 Hz,
/// and the method's minimum duration is met.
pub fn validate_pair(reference: AudioBufferRef<'_>, target: AudioBufferRef<'_>, method: Method) -> Result<()> {
    validate_buffer(reference)?;
    validate_buffer(target)?;

    if reference.sample_rate.abs_diff(target.sample_rate) > 1 {
        return Err(AlignError::UnsupportedFormat(format!(
            "sample rate mismatch: reference {} Hz vs target {} Hz",
            reference.sample_rate, target.sample_rate
        )));
    }

    let ref_duration = reference.samples.len() as f64 / reference.sample_rate as f64;
    let tgt_duration = target.samples.len() as f64 / target.sample_rate as f64;
    let ratio = ref_duration / tgt_duration;
    if !(0.1..=10.0).contains(&ratio) {
        return Err(AlignError::UnsupportedFormat(format!(
            "reference/target duration ratio {ratio:.3} outside [0.1, 10]"
        )));
    }

    let min_samples = method.min_samples(reference.sample_rate);
    if reference.samples.len() < min_samples || target.samples.len() < min_samples {
        return Err(AlignError::InsufficientData(format!(
            "{} requires at least {:.1}s of audio",
            method.name(),
            method.min_duration_s()
        )));
    }

    Ok(())
}

/// Audio-quality characterization: levels, dynamics, spectral shape, and
/// advisory warnings/recommendations. Has no side effects.
#[derive(Debug, Clone)]
pub struct AudioQualityReport {
    pub rms_level: f64,
    pub peak_level: f64,
    pub dynamic_range_db: f64,
    pub silence_ratio: f64,
    pub clipping_ratio: f64,
    pub zero_crossing_rate: f64,
    pub spectral_centroid_hz: f64,
    pub spectral_rolloff_hz: f64,
    pub has_sufficient_content: bool,
    pub has_excessive_clipping: bool,
    pub has_good_dynamic_range: bool,
    pub is_monotonic: bool,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
}

impl AudioQualityReport {
    /// Method-specific content sufficiency gate.
    pub fn sufficient_for(&self, method: Method) -> bool {
        match method {
            Method::SpectralFlux => {
                self.has_sufficient_content && !self.is_monotonic && self.zero_crossing_rate > 0.01
            }
            Method::Chroma => {
                self.has_sufficient_content
                    && self.has_good_dynamic_range
                    && self.spectral_centroid_hz > 200.0
            }
            Method::Energy => self.has_sufficient_content && self.dynamic_range_db > 6.0,
            Method::Mfcc => self.has_sufficient_content && !self.has_excessive_clipping,
            Method::Hybrid => self.has_sufficient_content,
        }
    }
}

fn representative_spectrum(samples: &[f32], sr: u32) -> Option<(Vec<f64>, Vec<f64>)> {
    if samples.is_empty() {
        return None;
    }
    let n = samples
        .len()
        .next_power_of_two()
        .clamp(crate::fft::MIN_FRAME_SIZE, crate::fft::MAX_FRAME_SIZE);
    let mut frame = vec![0.0f64; n];
    for (dst, &src) in frame.iter_mut().zip(samples.iter()) {
        *dst = src as f64;
    }
    let mag = magnitude_spectrum(&frame).ok()?;
    let freqs: Vec<f64> = (0..mag.len()).map(|k| bin_frequency(k, n, sr as f64)).collect();
    Some((mag, freqs))
}

fn spectral_centroid(mag: &[f64], freqs: &[f64]) -> f64 {
    let total: f64 = mag.iter().sum();
    if total < 1e-10 {
        return 0.0;
    }
    mag.iter().zip(freqs.iter()).map(|(m, f)| m * f).sum::<f64>() / total
}

fn spectral_rolloff(mag: &[f64], freqs: &[f64], rolloff: f64) -> f64 {
    let total: f64 = mag.iter().sum();
    if total < 1e-10 {
        return 0.0;
    }
    let threshold = rolloff * total;
    let mut cumulative = 0.0;
    for (m, f) in mag.iter().zip(freqs.iter()) {
        cumulative += m;
        if cumulative >= threshold {
            return *f;
        }
    }
    *freqs.last().unwrap_or(&0.0)
}

/// Characterize `samples` with no side effects.
pub fn analyze(samples: &[f32], sample_rate: u32) -> AudioQualityReport {
    let n = samples.len().max(1);
    let sum_sq: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    let rms_level = (sum_sq / n as f64).sqrt();
    let peak_level = samples.iter().fold(0.0f64, |m, &s| m.max((s as f64).abs()));

    let dynamic_range_db = 20.0 * (peak_level / (rms_level + 1e-10)).log10();

    let silence_amp = 10f64.powf(SILENCE_THRESHOLD_DB / 20.0);
    let silence_count = samples.iter().filter(|&&s| (s as f64).abs() < silence_amp).count();
    let silence_ratio = silence_count as f64 / n as f64;

    let clipping_count = samples
        .iter()
        .filter(|&&s| (s as f64).abs() >= CLIPPING_THRESHOLD)
        .count();
    let clipping_ratio = clipping_count as f64 / n as f64;

    let crossings = samples
        .windows(2)
        .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
        .count();
    let zero_crossing_rate = crossings as f64 / n as f64;

    let (spectral_centroid_hz, spectral_rolloff_hz) = match representative_spectrum(samples, sample_rate) {
        Some((mag, freqs)) => (spectral_centroid(&mag, &freqs), spectral_rolloff(&mag, &freqs, 0.85)),
        None => (0.0, 0.0),
    };

    let is_monotonic = samples.len() > 1
        && (samples.windows(2).all(|w| w[1] >= w[0]) || samples.windows(2).all(|w| w[1] <= w[0]));

    let has_sufficient_content = silence_ratio < 0.5 && rms_level > 1e-4;
    let has_excessive_clipping = clipping_ratio > 0.01;
    let has_good_dynamic_range = dynamic_range_db > 12.0;

    let mut warnings = Vec::new();
    let mut recommendations = Vec::new();

    if silence_ratio > 0.5 {
        warnings.push(format!("high silence ratio ({:.1}%)", silence_ratio * 100.0));
        recommendations.push("trim silent portions".to_string());
    }
    if has_excessive_clipping {
        warnings.push(format!("excessive clipping detected ({:.1}%)", clipping_ratio * 100.0));
        recommendations.push("reduce input gain before capture".to_string());
    }
    if !has_good_dynamic_range {
        warnings.push(format!("low dynamic range ({dynamic_range_db:.1} dB)"));
    }
    if spectral_centroid_hz < 200.0 {
        recommendations.push("use chroma-based method only if tonal content improves".to_string());
    }
    if is_monotonic {
        warnings.push("signal is monotonic; onset-based methods will struggle".to_string());
    }

    AudioQualityReport {
        rms_level,
        peak_level,
        dynamic_range_db,
        silence_ratio,
        clipping_ratio,
        zero_crossing_rate,
        spectral_centroid_hz,
        spectral_rolloff_hz,
        has_sufficient_content,
        has_excessive_clipping,
        has_good_dynamic_range,
        is_monotonic,
        warnings,
        recommendations,
    }
}

/// Estimated wall-clock processing time in seconds.
pub fn estimate_processing_time_s(duration_s: f64, method: Method, window_size: i32, hop_size: i32) -> f64 {
    let mut multiplier = method.time_multiplier();
    if window_size > 2048 {
        multiplier *= 1.5;
    }
    if hop_size < window_size / 8 {
        multiplier *= 1.2;
    }
    duration_s * multiplier
}

/// Estimated peak working-set memory in bytes.
pub fn estimate_memory_bytes(ref_samples: usize, tgt_samples: usize, window_size: i32) -> usize {
    let input_bytes = (ref_samples + tgt_samples) * std::mem::size_of::<f32>();
    let working_bytes = (ref_samples + tgt_samples) * 2 * std::mem::size_of::<f32>();
    let fft_bytes = 4 * window_size as usize * std::mem::size_of::<f32>();
    let correlation_bytes = (ref_samples + tgt_samples) * std::mem::size_of::<f64>();
    input_bytes + working_bytes + fft_bytes + correlation_bytes
}
