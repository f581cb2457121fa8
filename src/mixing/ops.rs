//! Sample-level building blocks for mixes: linear fades, additive overlay
//! and the output length cap.

use crate::audio::AudioBuffer;
use crate::error::{AudioError, Result};

fn fade_frames(buffer: &AudioBuffer, seconds: f64) -> usize {
    if !(seconds > 0.0) {
        return 0;
    }
    ((seconds * buffer.sample_rate() as f64).round() as usize).min(buffer.frames())
}

/// Linear ramp from silence over the first `seconds` of the buffer
pub fn fade_in(buffer: &AudioBuffer, seconds: f64) -> AudioBuffer {
    let n = fade_frames(buffer, seconds);
    let ch = buffer.channels() as usize;
    let mut out = buffer.clone();

    for (j, frame) in out.samples_mut().chunks_exact_mut(ch).take(n).enumerate() {
        let gain = j as f32 / n as f32;
        frame.iter_mut().for_each(|s| *s *= gain);
    }
    out
}

/// Linear ramp to silence over the last `seconds` of the buffer
///
/// The final frame is always fully silent.
pub fn fade_out(buffer: &AudioBuffer, seconds: f64) -> AudioBuffer {
    let n = fade_frames(buffer, seconds);
    let ch = buffer.channels() as usize;
    let start = buffer.frames() - n;
    let mut out = buffer.clone();

    for (j, frame) in out.samples_mut().chunks_exact_mut(ch).skip(start).enumerate() {
        let gain = 1.0 - (j + 1) as f32 / n as f32;
        frame.iter_mut().for_each(|s| *s *= gain);
    }
    out
}

/// Add `top` onto `base` starting at frame `position`
///
/// With `extend` false the result keeps the length of `base` and anything
/// past its end is dropped. With `extend` true the result grows to fit `top`.
pub fn overlay(base: &AudioBuffer, top: &AudioBuffer, position: usize, extend: bool) -> Result<AudioBuffer> {
    if base.channels() != top.channels() || base.sample_rate() != top.sample_rate() {
        return Err(AudioError::InvalidBuffer {
            details: format!(
                "cannot overlay {} Hz/{} ch onto {} Hz/{} ch",
                top.sample_rate(),
                top.channels(),
                base.sample_rate(),
                base.channels()
            ),
        }.into());
    }

    let ch = base.channels() as usize;
    let frames = if extend {
        base.frames().max(position + top.frames())
    } else {
        base.frames()
    };

    let mut samples = base.samples().to_vec();
    samples.resize(frames * ch, 0.0);

    let offset = position * ch;
    if offset < samples.len() {
        for (dst, &src) in samples[offset..].iter_mut().zip(top.samples()) {
            *dst += src;
        }
    }

    Ok(AudioBuffer::from_parts(samples, base.sample_rate(), base.channels()))
}

/// Truncate to `max_duration` seconds and fade the last `tail_fade` seconds out
///
/// Buffers already within the limit are returned unchanged.
pub fn cap_length(buffer: &AudioBuffer, max_duration: f64, tail_fade: f64) -> AudioBuffer {
    let max_frames = (max_duration * buffer.sample_rate() as f64).round() as usize;
    if buffer.frames() <= max_frames {
        return buffer.clone();
    }

    tracing::info!(
        "Capping mix from {:.2}s to {:.2}s with a {:.1}s tail fade",
        buffer.duration(),
        max_duration,
        tail_fade
    );

    fade_out(&buffer.slice_frames(0, max_frames), tail_fade)
}
