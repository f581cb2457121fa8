//! Loudness measurement, silence trimming and the loudness envelope.
//!
//! Levels are dBFS against a full scale of 1.0, computed from the RMS of all
//! interleaved samples in a window.

use crate::audio::types::{AudioBuffer, LoudnessPoint};
use crate::config::{LoudnessConfig, TrimConfig};

/// Default trim threshold (dBFS)
pub const DEFAULT_SILENCE_THRESHOLD_DB: f32 = -50.0;

/// Default trim chunk length (milliseconds)
pub const DEFAULT_TRIM_STEP_MS: u32 = 10;

/// Default envelope window (milliseconds)
pub const DEFAULT_FRAME_MS: u32 = 100;

/// Finite stand-in for the loudness of digital silence
pub const LOUDNESS_FLOOR_DB: f32 = -100.0;

/// RMS level of a block of samples
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum / samples.len() as f64).sqrt() as f32
}

/// Loudness in dBFS; negative infinity for silence or an empty block
pub fn dbfs(samples: &[f32]) -> f32 {
    let level = rms(samples);
    if level == 0.0 {
        return f32::NEG_INFINITY;
    }
    20.0 * level.log10()
}

fn frames_for_ms(buffer: &AudioBuffer, ms: u32) -> usize {
    ((buffer.sample_rate() as u64 * ms as u64) / 1000).max(1) as usize
}

/// Number of leading frames quieter than `threshold_db`, counted in whole chunks
fn leading_silence_frames(buffer: &AudioBuffer, threshold_db: f32, step_ms: u32) -> usize {
    let step = frames_for_ms(buffer, step_ms);
    let ch = buffer.channels() as usize;
    let total = buffer.frames();
    let samples = buffer.samples();

    let mut trimmed = 0;
    while trimmed < total {
        let end = (trimmed + step).min(total);
        if dbfs(&samples[trimmed * ch..end * ch]) >= threshold_db {
            break;
        }
        trimmed = end;
    }
    trimmed
}

/// Remove leading chunks below `threshold_db`
///
/// A buffer that is silent throughout trims to empty.
pub fn trim_leading(buffer: &AudioBuffer, threshold_db: f32, step_ms: u32) -> AudioBuffer {
    let start = leading_silence_frames(buffer, threshold_db, step_ms);
    buffer.slice_frames(start, buffer.frames())
}

/// Remove trailing chunks below `threshold_db`
pub fn trim_trailing(buffer: &AudioBuffer, threshold_db: f32, step_ms: u32) -> AudioBuffer {
    trim_leading(&buffer.reversed(), threshold_db, step_ms).reversed()
}

/// Trim both edges using the configured threshold and step
pub fn trim_silence(buffer: &AudioBuffer, config: &TrimConfig) -> AudioBuffer {
    let leading = trim_leading(buffer, config.threshold_db, config.step_ms);
    let trimmed = trim_trailing(&leading, config.threshold_db, config.step_ms);

    tracing::debug!(
        "Trimmed silence: {:.3}s -> {:.3}s",
        buffer.duration(),
        trimmed.duration()
    );
    trimmed
}

/// Loudness of consecutive non-overlapping windows of `frame_ms`
///
/// Silent windows report `floor_db` instead of negative infinity. A final
/// partial window is included.
pub fn loudness_envelope(buffer: &AudioBuffer, frame_ms: u32, floor_db: f32) -> Vec<LoudnessPoint> {
    let window = frames_for_ms(buffer, frame_ms);
    let ch = buffer.channels() as usize;
    let rate = buffer.sample_rate() as f64;

    buffer
        .samples()
        .chunks(window * ch)
        .enumerate()
        .map(|(i, chunk)| LoudnessPoint {
            time: (i * window) as f64 / rate,
            loudness_db: dbfs(chunk).max(floor_db),
        })
        .collect()
}

/// Loudness envelope using the configured window and floor
pub fn loudness_envelope_with(buffer: &AudioBuffer, config: &LoudnessConfig) -> Vec<LoudnessPoint> {
    loudness_envelope(buffer, config.frame_ms, config.floor_db)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 1000;

    fn tone(frames: usize, amplitude: f32) -> Vec<f32> {
        (0..frames)
            .map(|i| if i % 2 == 0 { amplitude } else { -amplitude })
            .collect()
    }

    #[test]
    fn test_dbfs_levels() {
        assert_eq!(dbfs(&[0.0; 16]), f32::NEG_INFINITY);
        assert_eq!(dbfs(&[]), f32::NEG_INFINITY);
        assert!((dbfs(&tone(16, 1.0)) - 0.0).abs() < 1e-4);
        assert!((dbfs(&tone(16, 0.1)) + 20.0).abs() < 1e-3);
    }

    #[test]
    fn test_trim_both_edges() {
        let mut samples = vec![0.0; 100];
        samples.extend(tone(300, 0.5));
        samples.extend(vec![0.0; 50]);
        let buffer = AudioBuffer::mono(samples, RATE).unwrap();

        let lead = trim_leading(&buffer, DEFAULT_SILENCE_THRESHOLD_DB, DEFAULT_TRIM_STEP_MS);
        assert_eq!(lead.frames(), 350);

        let both = trim_trailing(&lead, DEFAULT_SILENCE_THRESHOLD_DB, DEFAULT_TRIM_STEP_MS);
        assert_eq!(both.frames(), 300);
        assert!(both.samples().iter().all(|s| s.abs() == 0.5));
    }

    #[test]
    fn test_trim_all_silent_yields_empty() {
        let buffer = AudioBuffer::silence(1234, RATE, 2);
        let trimmed = trim_silence(&buffer, &TrimConfig::default());
        assert!(trimmed.is_empty());
        assert_eq!(trimmed.channels(), 2);
    }

    #[test]
    fn test_trim_without_silent_edges_is_identity() {
        let buffer = AudioBuffer::mono(tone(505, 0.25), RATE).unwrap();
        let trimmed = trim_silence(&buffer, &TrimConfig::default());
        assert_eq!(trimmed, buffer);
    }

    #[test]
    fn test_quiet_noise_counts_as_silence() {
        let mut samples = tone(40, 0.0001);
        samples.extend(tone(60, 0.5));
        let buffer = AudioBuffer::mono(samples, RATE).unwrap();
        let trimmed = trim_leading(&buffer, -50.0, 10);
        assert_eq!(trimmed.frames(), 60);
    }

    #[test]
    fn test_envelope_clamps_silence() {
        let mut samples = vec![0.0; 100];
        samples.extend(tone(100, 1.0));
        samples.extend(tone(50, 0.1));
        let buffer = AudioBuffer::mono(samples, RATE).unwrap();

        let envelope = loudness_envelope(&buffer, 100, LOUDNESS_FLOOR_DB);
        assert_eq!(envelope.len(), 3);
        assert_eq!(envelope[0].loudness_db, LOUDNESS_FLOOR_DB);
        assert_eq!(envelope[0].time, 0.0);
        assert!(envelope[1].loudness_db.abs() < 1e-4);
        assert!((envelope[2].time - 0.2).abs() < 1e-9);
        assert!(envelope.iter().all(|p| p.loudness_db.is_finite()));
    }

    #[test]
    fn test_envelope_of_empty_buffer() {
        let buffer = AudioBuffer::silence(0, RATE, 1);
        assert!(loudness_envelope_with(&buffer, &LoudnessConfig::default()).is_empty());
    }
}
