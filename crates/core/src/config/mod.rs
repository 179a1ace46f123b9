use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{PlayerError, Result};

/// Storage key the volume percent is persisted under.
pub const DEFAULT_VOLUME_KEY: &str = "rhythm-v01-volume";

/// Top-level configuration structure for the playback engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Volume used until a persisted value is read, and after `dispose`.
    pub default_volume: u8,
    pub volume_key: String,
    pub volume_curve: VolumeCurve,
    /// Interval between progress samples while playing.
    pub tick_interval_ms: u64,
    /// Single-track looping; on by default since the menu previews loop.
    pub looped: bool,
    pub analyser: AnalyserConfig,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            default_volume: 70,
            volume_key: DEFAULT_VOLUME_KEY.to_string(),
            volume_curve: VolumeCurve::Linear,
            tick_interval_ms: 250,
            looped: true,
            analyser: AnalyserConfig::default(),
        }
    }
}

impl PlayerConfig {
    /// Parses a JSON document; missing fields fall back to their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_volume > 100 {
            return Err(PlayerError::InvalidInput(
                "default volume must be within 0..=100",
            ));
        }
        if self.tick_interval_ms == 0 {
            return Err(PlayerError::InvalidInput(
                "tick interval must be greater than zero",
            ));
        }
        self.analyser.validate()
    }
}

/// How a volume percent maps onto device gain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeCurve {
    /// `gain = percent / 100`, what a media element's `volume` expects.
    #[default]
    Linear,
    /// 1..=100 % spread over -60 dB..0 dB, 0 % is silence.
    Logarithmic,
}

/// Configuration of the frequency analysis tap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyserConfig {
    pub fft_size: usize,
    pub min_decibels: f32,
    pub max_decibels: f32,
    /// Weight of the previous frame in `[0, 1)`.
    pub smoothing: f32,
}

impl Default for AnalyserConfig {
    fn default() -> Self {
        Self {
            fft_size: 512,
            min_decibels: -100.0,
            max_decibels: -30.0,
            smoothing: 0.8,
        }
    }
}

impl AnalyserConfig {
    /// Number of magnitude values produced per sample.
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    pub fn validate(&self) -> Result<()> {
        if self.fft_size < 32 || !self.fft_size.is_power_of_two() {
            return Err(PlayerError::InvalidInput(
                "fft size must be a power of two of at least 32",
            ));
        }
        if !(self.min_decibels < self.max_decibels) {
            return Err(PlayerError::InvalidInput(
                "min decibels must be below max decibels",
            ));
        }
        if !(0.0..1.0).contains(&self.smoothing) {
            return Err(PlayerError::InvalidInput(
                "smoothing must be within [0, 1)",
            ));
        }
        Ok(())
    }
}
