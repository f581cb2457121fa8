//! # Automix
//!
//! Blend two music tracks into a single clip with a crossfade, a tempo-matched
//! overlay, or an automatic DJ-style transition.
//!
//! The library works purely on decoded audio held in memory. Decoding files,
//! encoding the result and any user interface are left to callers; the
//! [`audio::loader`] module offers a WAV/Symphonia front end for the bundled CLI.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use automix::{
//!     audio::{AudioLoader, AudioWriter},
//!     config::Config,
//!     mixing::{MixEngine, MixRequest, Strategy},
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let config = Config::default();
//! let track_a = AudioLoader::load("first.wav").await?;
//! let track_b = AudioLoader::load("second.mp3").await?;
//!
//! let engine = MixEngine::new(&config);
//! let request = MixRequest::new(Strategy::Automix, track_a, track_b, 15.0, 5.0);
//! let result = engine.mix(&request)?;
//!
//! println!("A: {}, B: {}, mix: {}", result.bpm_a, result.bpm_b, result.bpm_out);
//! AudioWriter::write_wav(&result.buffer, "mix.wav")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`audio`] - Buffers, tempo estimation, loudness, silence trimming, resampling
//! - [`mixing`] - Tempo alignment, the three mix strategies and the length cap
//! - [`config`] - Configuration management
//! - [`error`] - Error types
//!
//! ## Plugging In Another Tempo Estimator
//!
//! The engine accepts anything implementing [`TempoEstimator`](audio::TempoEstimator):
//!
//! ```rust,no_run
//! use automix::audio::{AudioBuffer, BpmEstimate, TempoEstimator};
//! use automix::config::MixConfig;
//! use automix::mixing::MixEngine;
//!
//! struct TaggedTempo(f32);
//!
//! impl TempoEstimator for TaggedTempo {
//!     fn estimate_bpm(&self, _buffer: &AudioBuffer) -> BpmEstimate {
//!         BpmEstimate::from_value(self.0)
//!     }
//! }
//!
//! let engine = MixEngine::with_estimator(MixConfig::default(), Box::new(TaggedTempo(124.0)));
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod mixing;

// Re-export commonly used types for convenience
pub use crate::{
    audio::{AudioBuffer, BpmEstimate, TempoAnalyzer, TempoEstimator},
    config::Config,
    error::{MixerError, Result},
    mixing::{MixEngine, MixRequest, MixResult, Strategy},
};
