//! # Audio Module
//!
//! Decoded audio buffers and the analysis that runs on them: tempo estimation,
//! loudness measurement, silence trimming and rate-scaled resampling.
//!
//! ## Core Features
//!
//! - **Tempo Estimation**: Spectral-flux onset strength, autocorrelation and beat tracking
//! - **Instantaneous Tempo**: One BPM reading per consecutive beat pair, for display
//! - **Loudness**: dBFS envelope with a finite floor for silent windows
//! - **Silence Trimming**: Chunked leading/trailing trim below a threshold
//! - **Resampling**: Tape-speed playback rate changes via `rubato`
//!
//! ## Usage
//!
//! ```rust,no_run
//! use automix::audio::{AudioLoader, TempoAnalyzer, TempoEstimator};
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let track = AudioLoader::load("song.wav").await?;
//!
//! let analyzer = TempoAnalyzer::new();
//! println!("Detected BPM: {}", analyzer.estimate_bpm(&track));
//! for point in analyzer.estimate_bpm_over_time(&track) {
//!     println!("{:>7.2}s  {:.1}", point.time, point.bpm);
//! }
//! # Ok(())
//! # }
//! ```

pub mod analyzer;
pub mod loader;
pub mod loudness;
pub mod resample;
pub mod types;

pub use analyzer::{TempoAnalyzer, TempoEstimator};
pub use loader::{AudioLoader, AudioWriter};
pub use loudness::{dbfs, loudness_envelope, trim_leading, trim_silence, trim_trailing};
pub use resample::{rate_scaled_resample, resample};
pub use types::{AudioBuffer, BpmEstimate, LoudnessPoint, TempoAnalysis, TempoPoint};
