use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::audio::{AudioBuffer, BpmEstimate};
use crate::error::{MixError, Result};

/// How the second track is brought in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Fade A out while B fades in, both bounded to the transition window
    Crossfade,

    /// Tempo-match B to A and play both from the start
    Beatmatch,

    /// Tempo-match, crossfade, then let B play to its end
    Automix,
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Crossfade => "crossfade",
            Self::Beatmatch => "beatmatch",
            Self::Automix => "automix",
        }
    }

    /// Whether the strategy tempo-aligns track B
    pub fn aligns_tempo(&self) -> bool {
        !matches!(self, Self::Crossfade)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Strategy {
    type Err = MixError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "crossfade" => Ok(Self::Crossfade),
            "beatmatch" => Ok(Self::Beatmatch),
            "automix" => Ok(Self::Automix),
            other => Err(MixError::InvalidParameters {
                details: format!("unknown strategy '{}'", other),
            }),
        }
    }
}

/// One mix to perform
#[derive(Debug, Clone)]
pub struct MixRequest {
    pub strategy: Strategy,
    pub track_a: AudioBuffer,
    pub track_b: AudioBuffer,

    /// Where the transition starts in track A (seconds)
    pub start_time: f64,

    /// Length of the transition (seconds)
    pub fade_duration: f64,
}

impl MixRequest {
    pub fn new(
        strategy: Strategy,
        track_a: AudioBuffer,
        track_b: AudioBuffer,
        start_time: f64,
        fade_duration: f64,
    ) -> Self {
        Self {
            strategy,
            track_a,
            track_b,
            start_time,
            fade_duration,
        }
    }

    /// Check the timing parameters
    pub fn validate(&self) -> Result<()> {
        if !(self.start_time.is_finite() && self.start_time >= 0.0) {
            return Err(MixError::InvalidParameters {
                details: format!("start time must be >= 0, got {}", self.start_time),
            }.into());
        }

        if !(self.fade_duration.is_finite() && self.fade_duration > 0.0) {
            return Err(MixError::InvalidParameters {
                details: format!("fade duration must be > 0, got {}", self.fade_duration),
            }.into());
        }

        Ok(())
    }
}

/// Finished mix plus the tempo metrics gathered on the way
#[derive(Debug, Clone)]
pub struct MixResult {
    /// Mixed audio, never longer than the configured maximum
    pub buffer: AudioBuffer,
    pub bpm_a: BpmEstimate,
    pub bpm_b: BpmEstimate,

    /// Tempo of the finished mix
    pub bpm_out: BpmEstimate,
    pub strategy_applied: Strategy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("Automix".parse::<Strategy>().unwrap(), Strategy::Automix);
        assert_eq!("crossfade".parse::<Strategy>().unwrap(), Strategy::Crossfade);
        assert!("mashup".parse::<Strategy>().is_err());
        assert_eq!(Strategy::Beatmatch.to_string(), "beatmatch");
    }

    #[test]
    fn test_only_crossfade_keeps_original_tempo() {
        assert!(!Strategy::Crossfade.aligns_tempo());
        assert!(Strategy::Beatmatch.aligns_tempo());
        assert!(Strategy::Automix.aligns_tempo());
    }

    #[test]
    fn test_request_validation() {
        let a = AudioBuffer::silence(10, 10, 1);
        let ok = MixRequest::new(Strategy::Crossfade, a.clone(), a.clone(), 0.0, 0.5);
        assert!(ok.validate().is_ok());

        let negative = MixRequest { start_time: -1.0, ..ok.clone() };
        assert!(negative.validate().is_err());

        let zero_fade = MixRequest { fade_duration: 0.0, ..ok.clone() };
        assert!(zero_fade.validate().is_err());

        let nan_fade = MixRequest { fade_duration: f64::NAN, ..ok };
        assert!(nan_fade.validate().is_err());
    }
}
