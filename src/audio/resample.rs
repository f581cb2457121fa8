//! Rate-scaled resampling.
//!
//! Tempo alignment here is the tape-speed trick, not time-stretching: the
//! samples are reinterpreted as if recorded at `sample_rate * rate` and then
//! converted to the target rate. Duration scales by `1 / rate` and pitch
//! scales by `rate`.

use rubato::{
    calculate_cutoff, Resampler, SincFixedIn, SincInterpolationParameters,
    SincInterpolationType, WindowFunction,
};

use crate::audio::types::AudioBuffer;
use crate::error::{AudioError, Result};

const CHUNK_SIZE: usize = 1024;

fn build_resampler(ratio: f64, channels: usize) -> Result<SincFixedIn<f32>> {
    let sinc_len = 256usize;
    let window = WindowFunction::BlackmanHarris2;
    let f_cutoff = calculate_cutoff(sinc_len, window);
    let params = SincInterpolationParameters {
        sinc_len,
        f_cutoff,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 128,
        window,
    };

    SincFixedIn::<f32>::new(ratio, 1.1, params, CHUNK_SIZE, channels)
        .map_err(|e| AudioError::ResampleFailed { reason: e.to_string() }.into())
}

fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let frames = samples.len() / channels;
    let mut planar = vec![Vec::with_capacity(frames); channels];
    for frame in samples.chunks_exact(channels) {
        for (ch, &s) in frame.iter().enumerate() {
            planar[ch].push(s);
        }
    }
    planar
}

fn interleave(planar: &[Vec<f32>], start: usize, frames: usize) -> Vec<f32> {
    let mut out = Vec::with_capacity(frames * planar.len());
    for i in start..start + frames {
        for chan in planar {
            out.push(chan.get(i).copied().unwrap_or(0.0));
        }
    }
    out
}

/// Play `buffer` at `rate` times its speed and deliver it at `target_rate`
///
/// The output holds exactly `round(frames * target_rate / (sample_rate * rate))`
/// frames; the resampler's group delay is removed.
pub fn rate_scaled_resample(buffer: &AudioBuffer, rate: f64, target_rate: u32) -> Result<AudioBuffer> {
    if !(rate.is_finite() && rate > 0.0) {
        return Err(AudioError::ResampleFailed {
            reason: format!("playback rate must be positive, got {}", rate),
        }.into());
    }
    if target_rate == 0 {
        return Err(AudioError::ResampleFailed {
            reason: "target sample rate must be positive".to_string(),
        }.into());
    }

    let declared_rate = buffer.sample_rate() as f64 * rate;
    let ratio = target_rate as f64 / declared_rate;
    let channels = buffer.channels() as usize;

    if (ratio - 1.0).abs() < 1e-9 {
        return Ok(AudioBuffer::from_parts(
            buffer.samples().to_vec(),
            target_rate,
            buffer.channels(),
        ));
    }

    let expected = (buffer.frames() as f64 * ratio).round() as usize;
    if buffer.is_empty() || expected == 0 {
        return Ok(AudioBuffer::silence(0, target_rate, buffer.channels()));
    }

    tracing::debug!(
        "Resampling {} frames: declared {:.1} Hz -> {} Hz (ratio {:.4})",
        buffer.frames(),
        declared_rate,
        target_rate,
        ratio
    );

    let mut resampler = build_resampler(ratio, channels)?;
    let delay = resampler.output_delay();
    let planar = deinterleave(buffer.samples(), channels);
    let input_frames = buffer.frames();

    let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(expected + delay + CHUNK_SIZE); channels];
    let mut pos = 0usize;

    // Keep feeding (zero-padded past the end) until the delayed tail is flushed
    while output[0].len() < expected + delay {
        let need = resampler.input_frames_next();
        let block: Vec<Vec<f32>> = planar
            .iter()
            .map(|chan| {
                let mut block = vec![0.0f32; need];
                if pos < input_frames {
                    let n = (input_frames - pos).min(need);
                    block[..n].copy_from_slice(&chan[pos..pos + n]);
                }
                block
            })
            .collect();

        let processed = resampler
            .process(&block, None)
            .map_err(|e| AudioError::ResampleFailed { reason: e.to_string() })?;

        for (out, chunk) in output.iter_mut().zip(processed) {
            out.extend_from_slice(&chunk);
        }
        pos += need;
    }

    Ok(AudioBuffer::from_parts(
        interleave(&output, delay, expected),
        target_rate,
        buffer.channels(),
    ))
}

/// Plain sample rate conversion, no speed change
pub fn resample(buffer: &AudioBuffer, target_rate: u32) -> Result<AudioBuffer> {
    rate_scaled_resample(buffer, 1.0, target_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, seconds: f32, rate: u32) -> AudioBuffer {
        let frames = (seconds * rate as f32) as usize;
        let samples = (0..frames)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / rate as f32).sin() * 0.5)
            .collect();
        AudioBuffer::mono(samples, rate).unwrap()
    }

    fn zero_crossings(samples: &[f32]) -> usize {
        samples
            .windows(2)
            .filter(|pair| (pair[0] >= 0.0) != (pair[1] >= 0.0))
            .count()
    }

    #[test]
    fn test_identity_rate_is_copy() {
        let input = sine(440.0, 0.1, 8000);
        let output = rate_scaled_resample(&input, 1.0, 8000).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn test_rate_scales_duration() {
        let input = sine(200.0, 2.0, 8000);
        let output = rate_scaled_resample(&input, 1.25, 8000).unwrap();

        assert_eq!(output.sample_rate(), 8000);
        assert_eq!(output.frames(), 12800);
        assert!((output.duration() - 1.6).abs() < 1e-9);
    }

    #[test]
    fn test_rate_scales_pitch() {
        let input = sine(200.0, 2.0, 8000);
        let output = rate_scaled_resample(&input, 1.5, 8000).unwrap();

        // 200 Hz played 1.5x faster is 300 Hz, over 1/1.5 of the time
        let crossings_in = zero_crossings(&input.samples()[..8000]);
        let crossings_out = zero_crossings(&output.samples()[..8000]);
        let ratio = crossings_out as f32 / crossings_in as f32;
        assert!((ratio - 1.5).abs() < 0.05, "pitch ratio was {}", ratio);
    }

    #[test]
    fn test_plain_resample_changes_rate_only() {
        let input = AudioBuffer::new(vec![0.1; 4410 * 2], 44100, 2).unwrap();
        let output = resample(&input, 48000).unwrap();
        assert_eq!(output.sample_rate(), 48000);
        assert_eq!(output.channels(), 2);
        assert_eq!(output.frames(), 4800);
    }

    #[test]
    fn test_empty_input() {
        let input = AudioBuffer::silence(0, 8000, 2);
        let output = rate_scaled_resample(&input, 1.2, 8000).unwrap();
        assert!(output.is_empty());
        assert_eq!(output.channels(), 2);
    }

    #[test]
    fn test_rejects_bad_rate() {
        let input = sine(100.0, 0.1, 8000);
        assert!(rate_scaled_resample(&input, 0.0, 8000).is_err());
        assert!(rate_scaled_resample(&input, f64::NAN, 8000).is_err());
    }
}
