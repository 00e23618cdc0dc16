//! The five alignment methods and the per-method constants the rest of the
//! crate keys off of (minimum duration, resource multipliers, ABI codes).

/// Alignment method selector. Numeric values are the stable ABI method kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Method {
    SpectralFlux = 0,
    Chroma = 1,
    Energy = 2,
    Mfcc = 3,
    Hybrid = 4,
}

pub const ALL_PRIMARY_METHODS: [Method; 4] =
    [Method::SpectralFlux, Method::Chroma, Method::Energy, Method::Mfcc];

/// Order in which graceful degradation tries fallback methods.
pub const FALLBACK_ORDER: [Method; 5] = [
    Method::Energy,
    Method::SpectralFlux,
    Method::Chroma,
    Method::Mfcc,
    Method::Hybrid,
];

impl Method {
    pub fn from_i32(v: i32) -> Option<Method> {
        match v {
            0 => Some(Method::SpectralFlux),
            1 => Some(Method::Chroma),
            2 => Some(Method::Energy),
            3 => Some(Method::Mfcc),
            4 => Some(Method::Hybrid),
            _ => None,
        }
    }

    /// Short ASCII identifier published in `Result::method`, `<= 32` bytes.
    pub fn name(self) -> &'static str {
        match self {
            Method::SpectralFlux => "Spectral Flux",
            Method::Chroma => "Chroma Features",
            Method::Energy => "Energy Correlation",
            Method::Mfcc => "MFCC",
            Method::Hybrid => "Hybrid",
        }
    }

    /// Minimum audio duration, in seconds, below which the method reports
    /// `INSUFFICIENT_DATA`.
    pub fn min_duration_s(self) -> f64 {
        match self {
            Method::SpectralFlux => 2.0,
            Method::Chroma => 4.0,
            Method::Energy => 1.0,
            Method::Mfcc => 3.0,
            Method::Hybrid => 4.0,
        }
    }

    pub fn min_samples(self, sample_rate: u32) -> usize {
        (self.min_duration_s() * sample_rate as f64).ceil() as usize
    }

    /// Processing-time multiplier used by the resource estimator.
    pub fn time_multiplier(self) -> f64 {
        match self {
            Method::SpectralFlux => 0.08,
            Method::Chroma => 0.12,
            Method::Energy => 0.04,
            Method::Mfcc => 0.18,
            Method::Hybrid => 0.35,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_i32() {
        for m in [
            Method::SpectralFlux,
            Method::Chroma,
            Method::Energy,
            Method::Mfcc,
            Method::Hybrid,
        ] {
            assert_eq!(Method::from_i32(m as i32), Some(m));
        }
    }

    #[test]
    fn unknown_code_is_none() {
        assert_eq!(Method::from_i32(99), None);
    }

    #[test]
    fn names_fit_abi_buffer() {
        for m in ALL_PRIMARY_METHODS.iter().chain([Method::Hybrid].iter()) {
            assert!(m.name().len() < 32);
        }
    }
}
