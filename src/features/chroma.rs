//! 12-dimensional chromagram from the FFT magnitude spectrum.
//!
//! Uses a linear-FFT bin-to-pitch-class mapping restricted to the 80-2000 Hz
//! band rather than a constant-Q transform, which is cheaper and sufficient
//! for cross-correlation alignment.

use super::{check_cancelled, frame_count, frames, validate_frame_params, FeatureFrameSequence};
use crate::cancel::CancelToken;
use crate::error::Result;
use crate::fft::{bin_frequency, magnitude_spectrum};

pub const NUM_CHROMA_BINS: usize = 12;
const FREQ_MIN: f64 = 80.0;
const FREQ_MAX: f64 = 2000.0;

/// Map a frequency in Hz to a MIDI pitch-class index `[0, 12)`, or `None` if
/// outside the `(80, 2000)` Hz band this extractor considers.
fn pitch_class(freq_hz: f64) -> Option<usize> {
    if !(FREQ_MIN..FREQ_MAX).contains(&freq_hz) || freq_hz <= 0.0 {
        return None;
    }
    let midi = 12.0 * (freq_hz / 440.0).log2() + 69.0;
    let class = midi.floor().rem_euclid(12.0) as usize;
    Some(class.min(11))
}

fn l1_normalize(chroma: &mut [f64; NUM_CHROMA_BINS]) {
    let sum: f64 = chroma.iter().sum();
    if sum > 1e-12 {
        for v in chroma.iter_mut() {
            *v /= sum;
        }
    }
}

pub fn extract(samples: &[f64], sr: f64, window: usize, hop: usize, cancel: &CancelToken) -> Result<FeatureFrameSequence> {
    validate_frame_params(window, hop)?;
    let count = frame_count(samples.len(), window, hop);
    let mut out = Vec::with_capacity(count);

    for frame in frames(samples, window, hop) {
        check_cancelled(cancel)?;
        let mag = magnitude_spectrum(frame)?;
        let mut chroma = [0.0f64; NUM_CHROMA_BINS];
        for (k, &m) in mag.iter().enumerate().skip(1) {
            let freq = bin_frequency(k, window, sr);
            if let Some(class) = pitch_class(freq) {
                chroma[class] += m;
            }
        }
        l1_normalize(&mut chroma);
        out.push(chroma.to_vec());
    }

    Ok(FeatureFrameSequence {
        frames: out,
        dim: NUM_CHROMA_BINS,
        hop_size: hop,
    })
}
