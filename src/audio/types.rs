use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AudioError, Result};

/// Decoded PCM audio held in memory
///
/// Samples are interleaved `f32` in `[-1.0, 1.0]`. Every operation that
/// derives a new buffer copies; nothing aliases back into the source.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl AudioBuffer {
    /// Build a buffer, rejecting malformed sample data
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Result<Self> {
        if sample_rate == 0 {
            return Err(AudioError::InvalidBuffer {
                details: "sample rate must be positive".to_string(),
            }.into());
        }

        if channels == 0 {
            return Err(AudioError::InvalidBuffer {
                details: "channel count must be at least 1".to_string(),
            }.into());
        }

        if samples.len() % channels as usize != 0 {
            return Err(AudioError::InvalidBuffer {
                details: format!(
                    "{} samples do not divide into {} channels",
                    samples.len(),
                    channels
                ),
            }.into());
        }

        if let Some(index) = samples.iter().position(|s| !s.is_finite()) {
            return Err(AudioError::InvalidBuffer {
                details: format!("non-finite sample at index {}", index),
            }.into());
        }

        Ok(Self { samples, sample_rate, channels })
    }

    /// Mono buffer from a single channel of samples
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        Self::new(samples, sample_rate, 1)
    }

    /// A buffer of digital silence
    pub fn silence(frames: usize, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples: vec![0.0; frames * channels.max(1) as usize],
            sample_rate: sample_rate.max(1),
            channels: channels.max(1),
        }
    }

    /// Internal constructor for buffers derived from an already-valid one
    pub(crate) fn from_parts(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        debug_assert!(sample_rate > 0 && channels > 0);
        debug_assert_eq!(samples.len() % channels as usize, 0);
        Self { samples, sample_rate, channels }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub(crate) fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of sample frames (one sample per channel)
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Frame index nearest to a time in seconds, clamped to the buffer
    pub fn frame_at(&self, seconds: f64) -> usize {
        if !(seconds > 0.0) {
            return 0;
        }
        let frame = (seconds * self.sample_rate as f64).round();
        (frame as usize).min(self.frames())
    }

    /// Get mono mix of all channels
    pub fn mono_samples(&self) -> Vec<f32> {
        if self.channels == 1 {
            return self.samples.clone();
        }

        self.samples
            .chunks_exact(self.channels as usize)
            .map(|frame| frame.iter().sum::<f32>() / self.channels as f32)
            .collect()
    }

    /// Copy of the frames in `[start, end)`, clamped to the buffer
    pub fn slice_frames(&self, start: usize, end: usize) -> Self {
        let frames = self.frames();
        let start = start.min(frames);
        let end = end.clamp(start, frames);
        let ch = self.channels as usize;

        Self::from_parts(
            self.samples[start * ch..end * ch].to_vec(),
            self.sample_rate,
            self.channels,
        )
    }

    /// Copy of the time range `[start, end)` in seconds, clamped to `[0, duration]`
    pub fn slice(&self, start: f64, end: f64) -> Self {
        self.slice_frames(self.frame_at(start), self.frame_at(end))
    }

    /// Copy from `start` seconds to the end of the buffer
    pub fn slice_from(&self, start: f64) -> Self {
        self.slice_frames(self.frame_at(start), self.frames())
    }

    /// Frames in reverse order, channel order within each frame preserved
    pub fn reversed(&self) -> Self {
        let ch = self.channels as usize;
        let samples = self
            .samples
            .chunks_exact(ch)
            .rev()
            .flatten()
            .copied()
            .collect();

        Self::from_parts(samples, self.sample_rate, self.channels)
    }

    /// Convert to `channels` by duplicating mono or averaging down to mono
    pub fn with_channels(&self, channels: u16) -> Result<Self> {
        if channels == self.channels {
            return Ok(self.clone());
        }

        if self.channels == 1 && channels > 1 {
            let samples = self
                .samples
                .iter()
                .flat_map(|&s| std::iter::repeat(s).take(channels as usize))
                .collect();
            return Ok(Self::from_parts(samples, self.sample_rate, channels));
        }

        if channels == 1 {
            return Ok(Self::from_parts(self.mono_samples(), self.sample_rate, 1));
        }

        Err(AudioError::UnsupportedChannelLayout {
            channels: self.channels,
            target: channels,
        }.into())
    }
}

/// Global tempo of a buffer
///
/// `Unknown` is a valid outcome: the signal was too short, too quiet, or
/// had no usable periodicity. Callers skip rate adjustment in that case.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BpmEstimate {
    Global(f32),
    Unknown,
}

impl BpmEstimate {
    /// Wrap a value, mapping non-positive or non-finite input to `Unknown`
    pub fn from_value(bpm: f32) -> Self {
        if bpm.is_finite() && bpm > 0.0 {
            Self::Global(bpm)
        } else {
            Self::Unknown
        }
    }

    pub fn value(&self) -> Option<f32> {
        match *self {
            Self::Global(bpm) => Some(bpm),
            Self::Unknown => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Self::Global(_))
    }
}

impl fmt::Display for BpmEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global(bpm) => write!(f, "{:.1} BPM", bpm),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Instantaneous tempo derived from one pair of consecutive beats
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoPoint {
    /// Time of the later beat of the pair (seconds)
    pub time: f64,
    pub bpm: f32,
}

/// One window of the loudness envelope
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoudnessPoint {
    /// Window start (seconds)
    pub time: f64,

    /// Loudness relative to full scale, clamped to a finite floor
    pub loudness_db: f32,
}

/// Full result of a tempo analysis run
#[derive(Debug, Clone)]
pub struct TempoAnalysis {
    /// Global tempo
    pub bpm: BpmEstimate,

    /// Beat positions in seconds, ascending
    pub beats: Vec<f64>,

    /// Relative strength of the chosen tempo against its competitors (0.0-1.0)
    pub confidence: f32,

    /// Onset strength per analysis frame
    pub onset_envelope: Vec<f32>,
}

impl TempoAnalysis {
    pub fn unknown() -> Self {
        Self {
            bpm: BpmEstimate::Unknown,
            beats: vec![],
            confidence: 0.0,
            onset_envelope: vec![],
        }
    }

    /// One instantaneous tempo reading per consecutive beat pair
    pub fn tempo_curve(&self) -> Vec<TempoPoint> {
        self.beats
            .windows(2)
            .filter(|pair| pair[1] > pair[0])
            .map(|pair| TempoPoint {
                time: pair[1],
                bpm: (60.0 / (pair[1] - pair[0])) as f32,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mono_conversion() {
        let stereo = AudioBuffer::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 44100, 2).unwrap();
        assert_eq!(stereo.mono_samples(), vec![1.5, 3.5, 5.5]);
    }

    #[test]
    fn test_rejects_malformed_buffers() {
        assert!(AudioBuffer::new(vec![0.0; 3], 44100, 2).is_err());
        assert!(AudioBuffer::new(vec![0.0; 4], 0, 2).is_err());
        assert!(AudioBuffer::new(vec![0.0; 4], 44100, 0).is_err());
        assert!(AudioBuffer::new(vec![0.0, f32::NAN], 44100, 1).is_err());
    }

    #[test]
    fn test_slice_clamps_and_copies() {
        let buffer = AudioBuffer::mono((0..10).map(|i| i as f32 / 10.0).collect(), 10).unwrap();

        let middle = buffer.slice(0.2, 0.5);
        assert_eq!(middle.samples(), &[0.2, 0.3, 0.4]);

        let past_end = buffer.slice(0.8, 5.0);
        assert_eq!(past_end.frames(), 2);

        let beyond = buffer.slice(2.0, 3.0);
        assert!(beyond.is_empty());

        let backwards = buffer.slice(0.5, 0.2);
        assert!(backwards.is_empty());

        let negative = buffer.slice(-1.0, 0.1);
        assert_eq!(negative.samples(), &[0.0]);
    }

    #[test]
    fn test_reversed_keeps_channel_order() {
        let stereo = AudioBuffer::new(vec![1.0, -1.0, 2.0, -2.0], 8000, 2).unwrap();
        assert_eq!(stereo.reversed().samples(), &[2.0, -2.0, 1.0, -1.0]);
    }

    #[test]
    fn test_channel_conversion() {
        let mono = AudioBuffer::mono(vec![0.5, -0.5], 8000).unwrap();
        let stereo = mono.with_channels(2).unwrap();
        assert_eq!(stereo.samples(), &[0.5, 0.5, -0.5, -0.5]);
        assert_eq!(stereo.with_channels(1).unwrap(), mono);

        let quad = AudioBuffer::silence(4, 8000, 4);
        assert!(quad.with_channels(2).is_err());
    }

    #[test]
    fn test_duration() {
        let buffer = AudioBuffer::silence(22050, 44100, 2);
        assert_eq!(buffer.frames(), 22050);
        assert_eq!(buffer.duration(), 0.5);
    }

    #[test]
    fn test_tempo_curve() {
        let analysis = TempoAnalysis {
            beats: vec![0.0, 0.5, 1.0, 1.6],
            ..TempoAnalysis::unknown()
        };
        let curve = analysis.tempo_curve();
        assert_eq!(curve.len(), 3);
        assert!((curve[0].bpm - 120.0).abs() < 1e-3);
        assert!((curve[2].bpm - 100.0).abs() < 1e-3);
        assert_eq!(curve[2].time, 1.6);

        assert!(TempoAnalysis::unknown().tempo_curve().is_empty());
    }

    #[test]
    fn test_bpm_estimate() {
        assert_eq!(BpmEstimate::from_value(0.0), BpmEstimate::Unknown);
        assert_eq!(BpmEstimate::from_value(f32::NAN), BpmEstimate::Unknown);
        assert_eq!(BpmEstimate::from_value(128.0).value(), Some(128.0));
        assert_eq!(BpmEstimate::Unknown.to_string(), "unknown");
    }
}
