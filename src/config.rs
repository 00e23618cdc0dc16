//! Alignment configuration: primary knobs, extended per-feature tuning,
//! profile/content-type presets, validation and TOML persistence.

use crate::error::{AlignError, Result};
use serde::{Deserialize, Serialize};

const CONFIG_FORMAT_VERSION: u32 = 1;

/// Processing quality/speed preset, applied before content-type tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Profile {
    Fast,
    Balanced,
    Accurate,
    HighQuality,
    LowResource,
    Custom,
}

/// Content-type preset, applied after the profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentType {
    Music,
    Speech,
    Ambient,
    Broadcast,
    Podcast,
    MultiCam,
    General,
}

fn default_confidence_threshold() -> f64 {
    0.7
}
fn default_window_size() -> i32 {
    2048
}
fn default_hop_size() -> i32 {
    512
}
fn default_noise_gate_db() -> f64 {
    -50.0
}
fn default_max_offset_samples() -> i64 {
    0
}
fn default_pre_emphasis_alpha() -> f64 {
    0.97
}
fn default_median_filter_size() -> i32 {
    3
}
fn default_num_chroma_bins() -> i32 {
    12
}
fn default_smoothing_window() -> i32 {
    5
}
fn default_num_mfcc_coeffs() -> i32 {
    13
}
fn default_num_mel_filters() -> i32 {
    26
}

/// Round `n` to the closer of the floor and ceiling powers of two (ties
/// round down), unlike `i32::next_power_of_two` which always rounds up.
fn nearest_power_of_two(n: i32) -> i32 {
    if n <= 1 {
        return 1;
    }
    let upper = n.next_power_of_two();
    let lower = upper / 2;
    if lower == 0 || (n - lower) > (upper - n) {
        upper
    } else {
        lower
    }
}

/// Full alignment configuration. Primary knobs mirror the ABI `Config`
/// struct field-for-field; the extended fields are Rust-only tuning not
/// exposed across the C boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    #[serde(default = "default_window_size")]
    pub window_size: i32,
    #[serde(default = "default_hop_size")]
    pub hop_size: i32,
    #[serde(default = "default_noise_gate_db")]
    pub noise_gate_db: f64,
    /// `0` means unbounded.
    #[serde(default = "default_max_offset_samples")]
    pub max_offset_samples: i64,
    #[serde(default)]
    pub enable_drift_correction: bool,

    #[serde(default = "default_pre_emphasis_alpha")]
    pub pre_emphasis_alpha: f64,
    #[serde(default = "default_median_filter_size")]
    pub median_filter_size: i32,
    #[serde(default = "default_num_chroma_bins")]
    pub num_chroma_bins: i32,
    #[serde(default = "default_smoothing_window")]
    pub smoothing_window: i32,
    #[serde(default = "default_num_mfcc_coeffs")]
    pub num_mfcc_coeffs: i32,
    #[serde(default = "default_num_mel_filters")]
    pub num_mel_filters: i32,
    #[serde(default = "Config::default_include_c0")]
    pub include_c0: bool,

    #[serde(default)]
    pub profile: Option<Profile>,
    #[serde(default)]
    pub content_type: Option<ContentType>,
}

impl Config {
    fn default_include_c0() -> bool {
        true
    }

    /// Compose this config with a profile preset.
    pub fn with_profile(mut self, profile: Profile) -> Self {
        match profile {
            Profile::Fast => {
                self.window_size = 1024;
                self.hop_size = 512;
                self.confidence_threshold = 0.6;
            }
            Profile::Balanced => {
                self.window_size = 2048;
                self.hop_size = 512;
                self.confidence_threshold = 0.7;
            }
            Profile::Accurate => {
                self.window_size = 4096;
                self.hop_size = 256;
                self.confidence_threshold = 0.75;
            }
            Profile::HighQuality => {
                self.window_size = 4096;
                self.hop_size = 128;
                self.confidence_threshold = 0.8;
                self.num_mfcc_coeffs = 20;
                self.num_mel_filters = 40;
            }
            Profile::LowResource => {
                self.window_size = 1024;
                self.hop_size = 1024;
                self.confidence_threshold = 0.6;
                self.num_mfcc_coeffs = 8;
                self.num_mel_filters = 16;
            }
            Profile::Custom => {}
        }
        self.profile = Some(profile);
        self
    }

    /// Compose this config with a content-type preset, applied after any
    /// profile so content-type tuning wins on overlapping fields.
    pub fn for_content_type(mut self, content_type: ContentType) -> Self {
        match content_type {
            ContentType::Music => {
                self.noise_gate_db = -50.0;
            }
            ContentType::Speech => {
                self.noise_gate_db = -40.0;
                self.num_mfcc_coeffs = 13;
            }
            ContentType::Ambient => {
                self.noise_gate_db = -60.0;
                self.confidence_threshold = (self.confidence_threshold - 0.1).max(0.3);
            }
            ContentType::Broadcast => {
                self.noise_gate_db = -45.0;
            }
            ContentType::Podcast => {
                self.noise_gate_db = -42.0;
                self.num_mfcc_coeffs = 13;
            }
            ContentType::MultiCam => {
                self.max_offset_samples = 0;
                self.enable_drift_correction = true;
            }
            ContentType::General => {}
        }
        self.content_type = Some(content_type);
        self
    }

    /// Validate field ranges and invariants. A non-power-of-two `window_size`
    /// that is still in range is logged as a warning rather than rejected;
    /// every other check here is a hard error.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(AlignError::InvalidInput(format!(
                "confidence_threshold {} outside [0, 1]",
                self.confidence_threshold
            )));
        }
        if !(64..=8_192).contains(&self.window_size) {
            return Err(AlignError::InvalidInput(format!(
                "window_size {} must be in [64, 8192]",
                self.window_size
            )));
        }
        if !self.window_size.is_power_of_two() {
            crate::logging::record(
                crate::error::Severity::Warn,
                crate::error::ErrorKind::InvalidInput,
                "config::validate",
                "config.rs",
                format!("window_size {} is not a power of two; consider auto_correct()", self.window_size),
            );
        }
        if self.hop_size <= 0 || self.hop_size > self.window_size {
            return Err(AlignError::InvalidInput(format!(
                "hop_size {} must be in (0, window_size]",
                self.hop_size
            )));
        }
        if !(-120.0..=0.0).contains(&self.noise_gate_db) {
            return Err(AlignError::InvalidInput(format!(
                "noise_gate_db {} must be in [-120, 0]",
                self.noise_gate_db
            )));
        }
        if self.max_offset_samples < 0 {
            return Err(AlignError::InvalidInput("max_offset_samples must be >= 0".into()));
        }
        if self.num_chroma_bins <= 0 {
            return Err(AlignError::InvalidInput("num_chroma_bins must be positive".into()));
        }
        if self.num_mfcc_coeffs <= 0 || self.num_mel_filters <= 0 {
            return Err(AlignError::InvalidInput(
                "num_mfcc_coeffs and num_mel_filters must be positive".into(),
            ));
        }
        if self.num_mfcc_coeffs as i32 > self.num_mel_filters {
            return Err(AlignError::InvalidInput(
                "num_mfcc_coeffs cannot exceed num_mel_filters".into(),
            ));
        }
        Ok(())
    }

    /// Clamp out-of-range fields to the nearest valid value instead of
    /// failing. Used by graceful degradation, which would rather continue
    /// with a corrected config than abort.
    pub fn auto_correct(&mut self) {
        self.confidence_threshold = self.confidence_threshold.clamp(0.0, 1.0);
        self.window_size = nearest_power_of_two(self.window_size.clamp(64, 8_192)).clamp(64, 8_192);
        if self.hop_size <= 0 {
            self.hop_size = self.window_size / 4;
        }
        self.hop_size = self.hop_size.min(self.window_size);
        self.noise_gate_db = self.noise_gate_db.clamp(-120.0, 0.0);
        if self.max_offset_samples < 0 {
            self.max_offset_samples = 0;
        }
        if self.num_chroma_bins <= 0 {
            self.num_chroma_bins = default_num_chroma_bins();
        }
        if self.num_mfcc_coeffs <= 0 {
            self.num_mfcc_coeffs = default_num_mfcc_coeffs();
        }
        if self.num_mel_filters <= 0 {
            self.num_mel_filters = default_num_mel_filters();
        }
        if self.num_mfcc_coeffs > self.num_mel_filters {
            self.num_mfcc_coeffs = self.num_mel_filters;
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        #[derive(Serialize)]
        struct Versioned<'a> {
            version: u32,
            #[serde(flatten)]
            config: &'a Config,
        }
        toml::to_string_pretty(&Versioned {
            version: CONFIG_FORMAT_VERSION,
            config: self,
        })
        .map_err(|e| AlignError::InvalidInput(format!("config serialization failed: {e}")))
    }

    pub fn from_toml(text: &str) -> Result<Config> {
        #[derive(Deserialize)]
        struct Versioned {
            #[serde(default)]
            #[allow(dead_code)]
            version: u32,
            #[serde(flatten)]
            config: Config,
        }
        let parsed: Versioned = toml::from_str(text)
            .map_err(|e| AlignError::InvalidInput(format!("config parse failed: {e}")))?;
        Ok(parsed.config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            confidence_threshold: default_confidence_threshold(),
            window_size: default_window_size(),
            hop_size: default_hop_size(),
            noise_gate_db: default_noise_gate_db(),
            max_offset_samples: default_max_offset_samples(),
            enable_drift_correction: false,
            pre_emphasis_alpha: default_pre_emphasis_alpha(),
            median_filter_size: default_median_filter_size(),
            num_chroma_bins: default_num_chroma_bins(),
            smoothing_window: default_smoothing_window(),
            num_mfcc_coeffs: default_num_mfcc_coeffs(),
            num_mel_filters: default_num_mel_filters(),
            include_c0: Config::default_include_c0(),
            profile: None,
            content_type: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_confidence() {
        let mut cfg = Config::default();
        cfg.confidence_threshold = 1.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn in_range_non_power_of_two_window_only_warns() {
        let mut cfg = Config::default();
        cfg.window_size = 100;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_window() {
        let mut cfg = Config::default();
        cfg.window_size = 16;
        assert!(cfg.validate().is_err());
        cfg.window_size = 16_384;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_noise_gate() {
        let mut cfg = Config::default();
        cfg.noise_gate_db = 5.0;
        assert!(cfg.validate().is_err());
        cfg.noise_gate_db = -121.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn auto_correct_fixes_window_size() {
        let mut cfg = Config::default();
        cfg.window_size = 1000;
        cfg.auto_correct();
        assert!(cfg.window_size.is_power_of_two());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn auto_correct_rounds_to_nearest_not_next_power_of_two() {
        let mut cfg = Config::default();
        cfg.window_size = 1025;
        cfg.auto_correct();
        assert_eq!(cfg.window_size, 1024);
    }

    #[test]
    fn auto_correct_clamps_noise_gate() {
        let mut cfg = Config::default();
        cfg.noise_gate_db = -500.0;
        cfg.auto_correct();
        assert_eq!(cfg.noise_gate_db, -120.0);
        cfg.noise_gate_db = 50.0;
        cfg.auto_correct();
        assert_eq!(cfg.noise_gate_db, 0.0);
    }

    #[test]
    fn profile_then_content_type_composes() {
        let cfg = Config::default()
            .with_profile(Profile::HighQuality)
            .for_content_type(ContentType::MultiCam);
        assert_eq!(cfg.window_size, 4096);
        assert!(cfg.enable_drift_correction);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn toml_round_trips() {
        let cfg = Config::default().with_profile(Profile::Fast);
        let text = cfg.to_toml().unwrap();
        let parsed = Config::from_toml(&text).unwrap();
        assert_eq!(parsed.window_size, cfg.window_size);
        assert_eq!(parsed.profile, cfg.profile);
    }

    #[test]
    fn from_toml_tolerates_missing_fields() {
        let parsed = Config::from_toml("version = 1\nwindow_size = 1024\n").unwrap();
        assert_eq!(parsed.window_size, 1024);
        assert_eq!(parsed.hop_size, default_hop_size());
    }
}
