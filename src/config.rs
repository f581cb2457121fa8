use std::path::Path;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Main configuration for automix
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Tempo analysis settings
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Mix composition settings
    #[serde(default)]
    pub mix: MixConfig,

    /// Silence trimming settings
    #[serde(default)]
    pub trim: TrimConfig,

    /// Loudness envelope settings
    #[serde(default)]
    pub loudness: LoudnessConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: Config = toml::from_str(&content)
            .map_err(|_| ConfigError::ParseFailed { path: path.display().to_string() })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::InvalidValue {
                key: "config".to_string(),
                value: e.to_string()
            })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.analysis.validate()?;
        self.mix.validate()?;
        self.trim.validate()?;
        self.loudness.validate()?;
        Ok(())
    }
}

fn invalid(key: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

/// Tempo analysis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Window size for FFT analysis
    pub window_size: usize,

    /// Hop size for analysis windows
    pub hop_size: usize,

    /// Minimum BPM to detect
    pub min_bpm: f32,

    /// Maximum BPM to detect
    pub max_bpm: f32,

    /// Center of the tempo prior used to break octave ambiguity
    pub prior_bpm: f32,

    /// RMS below which a buffer is treated as silent (tempo unknown)
    pub silence_threshold: f32,

    /// Wall-clock limit for a single estimation run by the CLI, 0 disables
    pub timeout_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window_size: 2048,
            hop_size: 512,
            min_bpm: 40.0,
            max_bpm: 240.0,
            prior_bpm: 120.0,
            silence_threshold: 1e-4,
            timeout_secs: 30,
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 || !self.window_size.is_power_of_two() {
            return Err(invalid("analysis.window_size", self.window_size).into());
        }

        if self.hop_size == 0 || self.hop_size > self.window_size {
            return Err(invalid("analysis.hop_size", self.hop_size).into());
        }

        if self.min_bpm <= 0.0 || self.min_bpm >= self.max_bpm {
            return Err(invalid(
                "analysis.bpm_range",
                format!("{}-{}", self.min_bpm, self.max_bpm),
            ).into());
        }

        if self.prior_bpm <= 0.0 {
            return Err(invalid("analysis.prior_bpm", self.prior_bpm).into());
        }

        Ok(())
    }
}

/// Mix composition configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixConfig {
    /// Longest mix the engine will return (seconds)
    pub max_duration: f64,

    /// Fade-to-silence applied to the end of a capped mix (seconds)
    pub tail_fade: f64,

    /// Default transition start used by the CLI (seconds)
    pub start_time: f64,

    /// Default transition length used by the CLI (seconds)
    pub fade_duration: f64,
}

impl Default for MixConfig {
    fn default() -> Self {
        Self {
            max_duration: 60.0,
            tail_fade: 2.0,
            start_time: 15.0,
            fade_duration: 5.0,
        }
    }
}

impl MixConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.max_duration > 0.0) {
            return Err(invalid("mix.max_duration", self.max_duration).into());
        }

        if self.tail_fade < 0.0 || self.tail_fade > self.max_duration {
            return Err(invalid("mix.tail_fade", self.tail_fade).into());
        }

        if self.start_time < 0.0 {
            return Err(invalid("mix.start_time", self.start_time).into());
        }

        if !(self.fade_duration > 0.0) {
            return Err(invalid("mix.fade_duration", self.fade_duration).into());
        }

        Ok(())
    }
}

/// Silence trimming configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrimConfig {
    /// Chunks quieter than this are trimmed (dBFS)
    pub threshold_db: f32,

    /// Chunk length walked from each edge (milliseconds)
    pub step_ms: u32,
}

impl Default for TrimConfig {
    fn default() -> Self {
        Self {
            threshold_db: -50.0,
            step_ms: 10,
        }
    }
}

impl TrimConfig {
    pub fn validate(&self) -> Result<()> {
        if self.step_ms == 0 {
            return Err(invalid("trim.step_ms", self.step_ms).into());
        }
        if self.threshold_db > 0.0 {
            return Err(invalid("trim.threshold_db", self.threshold_db).into());
        }
        Ok(())
    }
}

/// Loudness envelope configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoudnessConfig {
    /// Window length (milliseconds)
    pub frame_ms: u32,

    /// Value reported for windows with no energy (dBFS)
    pub floor_db: f32,
}

impl Default for LoudnessConfig {
    fn default() -> Self {
        Self {
            frame_ms: 100,
            floor_db: -100.0,
        }
    }
}

impl LoudnessConfig {
    pub fn validate(&self) -> Result<()> {
        if self.frame_ms == 0 {
            return Err(invalid("loudness.frame_ms", self.frame_ms).into());
        }
        if !self.floor_db.is_finite() || self.floor_db > 0.0 {
            return Err(invalid("loudness.floor_db", self.floor_db).into());
        }
        Ok(())
    }
}
