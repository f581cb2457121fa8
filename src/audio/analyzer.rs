use realfft::RealFftPlanner;
use rustfft::{num_complex::Complex, FftPlanner};

use crate::audio::types::{AudioBuffer, BpmEstimate, TempoAnalysis, TempoPoint};
use crate::config::AnalysisConfig;
use crate::error::{AudioError, Result};

/// Envelope peaks below this are treated as "no onsets at all"
const MIN_ONSET_PEAK: f32 = 1e-3;

/// Beats are snapped to the strongest onset within this fraction of a period
const BEAT_SNAP_FRACTION: f32 = 0.3;

/// Anything that can put a global tempo on a buffer
pub trait TempoEstimator: Send + Sync {
    /// Global BPM, or `Unknown` when the signal does not support an estimate
    fn estimate_bpm(&self, buffer: &AudioBuffer) -> BpmEstimate;
}

/// Onset-strength tempo estimator and beat tracker
///
/// The pipeline is: mono downmix, Hann-windowed STFT, log-magnitude spectral
/// flux, autocorrelation of the flux envelope weighted by a log-normal tempo
/// prior, then a comb search for the beat phase.
pub struct TempoAnalyzer {
    config: AnalysisConfig,
}

impl TempoAnalyzer {
    /// Create a new analyzer with default configuration
    pub fn new() -> Self {
        Self::with_config(AnalysisConfig::default())
    }

    /// Create a new analyzer with custom configuration
    pub fn with_config(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Full tempo analysis. Never fails: internal errors surface as unknown tempo.
    pub fn analyze(&self, buffer: &AudioBuffer) -> TempoAnalysis {
        match self.try_analyze(buffer) {
            Ok(analysis) => analysis,
            Err(e) => {
                tracing::warn!("Tempo analysis failed, treating tempo as unknown: {}", e);
                TempoAnalysis::unknown()
            }
        }
    }

    /// Instantaneous BPM per consecutive beat pair; empty with fewer than two beats
    pub fn estimate_bpm_over_time(&self, buffer: &AudioBuffer) -> Vec<TempoPoint> {
        self.analyze(buffer).tempo_curve()
    }

    fn try_analyze(&self, buffer: &AudioBuffer) -> Result<TempoAnalysis> {
        self.config.validate()?;

        if buffer.is_empty() {
            tracing::debug!("Empty buffer, tempo unknown");
            return Ok(TempoAnalysis::unknown());
        }

        let mono = buffer.mono_samples();
        let level = crate::audio::loudness::rms(&mono);
        if level < self.config.silence_threshold {
            tracing::debug!("Buffer RMS {:.2e} below silence threshold, tempo unknown", level);
            return Ok(TempoAnalysis::unknown());
        }

        let sample_rate = buffer.sample_rate();
        let env_rate = sample_rate as f32 / self.config.hop_size as f32;

        // Step 1: onset strength
        let envelope = self.onset_envelope(&mono)?;
        let peak = envelope.iter().copied().fold(0.0f32, f32::max);
        if peak < MIN_ONSET_PEAK {
            tracing::debug!("No onsets detected, tempo unknown");
            return Ok(TempoAnalysis::unknown());
        }

        // Step 2: periodicity
        let (lag_min, lag_max) = self.lag_range(env_rate);
        if envelope.len() <= lag_max {
            tracing::debug!(
                "Onset envelope of {} frames is shorter than the slowest period ({} frames), tempo unknown",
                envelope.len(),
                lag_max
            );
            return Ok(TempoAnalysis::unknown());
        }

        let autocorr = autocorrelate(&envelope)?;
        let Some((period, confidence)) = self.pick_period(&autocorr, env_rate, lag_min, lag_max) else {
            tracing::debug!("No periodicity in onset envelope, tempo unknown");
            return Ok(TempoAnalysis::unknown());
        };

        // Step 3: beat tracking
        let beats = self.track_beats(&envelope, period, sample_rate);
        if beats.len() < 2 {
            tracing::debug!("Fewer than two beats tracked, tempo unknown");
            return Ok(TempoAnalysis::unknown());
        }

        let bpm = 60.0 * env_rate / period;
        let bpm = (bpm * 100.0).round() / 100.0;

        tracing::debug!(
            "Tempo estimation: {:.2} BPM (confidence: {:.2}) from {} beats",
            bpm, confidence, beats.len()
        );

        Ok(TempoAnalysis {
            bpm: BpmEstimate::from_value(bpm),
            beats,
            confidence,
            onset_envelope: envelope,
        })
    }

    /// Spectral flux of log-compressed magnitudes, one value per hop
    fn onset_envelope(&self, samples: &[f32]) -> Result<Vec<f32>> {
        let window_size = self.config.window_size;
        if samples.len() < window_size {
            return Ok(vec![]);
        }

        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(window_size);
        let mut spectrum_buffer = fft.make_output_vec();
        let mut input_buffer = fft.make_input_vec();

        let hann: Vec<f32> = (0..window_size)
            .map(|i| {
                0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (window_size - 1) as f32).cos())
            })
            .collect();

        let bins = window_size / 2 + 1;
        let mut previous: Option<Vec<f32>> = None;
        let mut envelope = Vec::with_capacity(samples.len() / self.config.hop_size + 1);

        for window in samples.windows(window_size).step_by(self.config.hop_size) {
            for ((slot, &sample), &w) in input_buffer.iter_mut().zip(window).zip(&hann) {
                *slot = sample * w;
            }

            fft.process(&mut input_buffer, &mut spectrum_buffer)
                .map_err(|e| AudioError::AnalysisFailed {
                    reason: format!("FFT processing failed: {}", e),
                })?;

            let current: Vec<f32> = spectrum_buffer
                .iter()
                .map(|c| c.norm().ln_1p())
                .collect();

            let flux = match &previous {
                Some(prev) => {
                    current
                        .iter()
                        .zip(prev)
                        .map(|(&curr, &prev)| (curr - prev).max(0.0))
                        .sum::<f32>()
                        / bins as f32
                }
                None => 0.0,
            };

            envelope.push(flux);
            previous = Some(current);
        }

        Ok(envelope)
    }

    fn lag_range(&self, env_rate: f32) -> (usize, usize) {
        let lag_min = (env_rate * 60.0 / self.config.max_bpm).floor() as usize;
        let lag_max = (env_rate * 60.0 / self.config.min_bpm).ceil() as usize;
        let lag_min = lag_min.max(1);
        (lag_min, lag_max.max(lag_min + 2))
    }

    fn prior(&self, bpm: f32) -> f32 {
        let octaves = (bpm / self.config.prior_bpm).log2();
        (-0.5 * octaves * octaves).exp()
    }

    /// Best beat period in (fractional) envelope frames and its confidence
    fn pick_period(
        &self,
        autocorr: &[f32],
        env_rate: f32,
        lag_min: usize,
        lag_max: usize,
    ) -> Option<(f32, f32)> {
        let lag_max = lag_max.min(autocorr.len().saturating_sub(2));
        if lag_max <= lag_min {
            return None;
        }

        let weighted: Vec<(usize, f32)> = (lag_min..=lag_max)
            .map(|lag| {
                let bpm = 60.0 * env_rate / lag as f32;
                (lag, autocorr[lag].max(0.0) * self.prior(bpm))
            })
            .collect();

        let &(best_lag, best_score) = weighted
            .iter()
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))?;
        if best_score <= 0.0 {
            return None;
        }

        // Confidence: share of the best peak among all local maxima
        let peak_sum: f32 = weighted
            .windows(3)
            .filter(|w| w[1].1 > w[0].1 && w[1].1 >= w[2].1)
            .map(|w| w[1].1)
            .sum::<f32>()
            .max(best_score);
        let confidence = (best_score / peak_sum).min(1.0);

        // Parabolic refinement on the raw autocorrelation
        let (a, b, c) = (autocorr[best_lag - 1], autocorr[best_lag], autocorr[best_lag + 1]);
        let denom = a - 2.0 * b + c;
        let delta = if denom.abs() > f32::EPSILON {
            (0.5 * (a - c) / denom).clamp(-0.5, 0.5)
        } else {
            0.0
        };

        Some((best_lag as f32 + delta, confidence))
    }

    /// Beat times in seconds: best comb phase, then snap each beat to its local peak
    fn track_beats(&self, envelope: &[f32], period: f32, sample_rate: u32) -> Vec<f64> {
        if period < 1.0 || envelope.is_empty() {
            return vec![];
        }

        let comb = |phase: f32| -> f32 {
            let mut sum = 0.0f32;
            let mut pos = phase;
            while (pos.round() as usize) < envelope.len() {
                sum += envelope[pos.round() as usize];
                pos += period;
            }
            sum
        };

        let best_phase = (0..period.ceil() as usize)
            .map(|phase| (phase, comb(phase as f32)))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(phase, _)| phase)
            .unwrap_or(0);

        let peak = envelope.iter().copied().fold(0.0f32, f32::max);
        let floor = peak * 0.1;
        let radius = ((period * BEAT_SNAP_FRACTION).max(1.0)) as isize;
        let last = envelope.len() as isize - 1;

        let mut beats = Vec::new();
        let mut pos = best_phase as f32;
        while (pos.round() as isize) <= last {
            let center = pos.round() as isize;
            let start = (center - radius).max(0) as usize;
            let end = (center + radius).min(last) as usize;

            let (idx, value) = envelope[start..=end]
                .iter()
                .enumerate()
                .fold((center as usize, f32::MIN), |best, (i, &v)| {
                    if v > best.1 { (start + i, v) } else { best }
                });

            if value > floor {
                beats.push(self.frame_time(idx, sample_rate));
            }
            pos += period;
        }

        beats.dedup_by(|a, b| (*a - *b).abs() < f64::EPSILON);
        beats
    }

    /// Center time of analysis frame `index`
    fn frame_time(&self, index: usize, sample_rate: u32) -> f64 {
        (index * self.config.hop_size + self.config.window_size / 2) as f64 / sample_rate as f64
    }
}

impl Default for TempoAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl TempoEstimator for TempoAnalyzer {
    fn estimate_bpm(&self, buffer: &AudioBuffer) -> BpmEstimate {
        self.analyze(buffer).bpm
    }
}

/// Biased autocorrelation of the mean-removed signal, normalized so lag 0 is 1.0
fn autocorrelate(x: &[f32]) -> Result<Vec<f32>> {
    let n = x.len();
    if n == 0 {
        return Ok(vec![]);
    }

    let mean = x.iter().sum::<f32>() / n as f32;
    let size = (2 * n).next_power_of_two();

    let mut planner = FftPlanner::<f32>::new();
    let forward = planner.plan_fft_forward(size);
    let inverse = planner.plan_fft_inverse(size);

    let mut buf: Vec<Complex<f32>> = vec![Complex::new(0.0, 0.0); size];
    for (slot, &v) in buf.iter_mut().zip(x) {
        slot.re = v - mean;
    }

    forward.process(&mut buf);
    for v in buf.iter_mut() {
        *v = Complex::new(v.norm_sqr(), 0.0);
    }
    inverse.process(&mut buf);

    let zero_lag = buf[0].re;
    if !(zero_lag > 0.0) || !zero_lag.is_finite() {
        return Err(AudioError::AnalysisFailed {
            reason: "onset envelope has no variance".to_string(),
        }.into());
    }

    Ok(buf[..n].iter().map(|c| c.re / zero_lag).collect())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Deterministic click track: a decaying 1 kHz burst on every beat
    pub(crate) fn click_track(bpm: f32, seconds: f32, sample_rate: u32, channels: u16) -> AudioBuffer {
        let frames = (seconds * sample_rate as f32) as usize;
        let beat_frames = 60.0 * sample_rate as f32 / bpm;
        let burst = (0.03 * sample_rate as f32) as usize;

        let mut mono = vec![0.0f32; frames];
        let mut beat = 0.0f32;
        while (beat as usize) < frames {
            let start = beat as usize;
            for i in 0..burst.min(frames - start) {
                let t = i as f32 / sample_rate as f32;
                let decay = (-t * 120.0).exp();
                mono[start + i] = 0.8 * decay * (2.0 * std::f32::consts::PI * 1000.0 * t).sin();
            }
            beat += beat_frames;
        }

        let samples = mono
            .iter()
            .flat_map(|&s| std::iter::repeat(s).take(channels as usize))
            .collect();
        AudioBuffer::new(samples, sample_rate, channels).unwrap()
    }

    #[test]
    fn test_detects_120_bpm() {
        let analyzer = TempoAnalyzer::new();
        let bpm = analyzer.estimate_bpm(&click_track(120.0, 12.0, 22050, 1));
        let bpm = bpm.value().expect("tempo should be known");
        assert!((bpm - 120.0).abs() < 2.0, "estimated {}", bpm);
    }

    #[test]
    fn test_detects_100_bpm_stereo() {
        let analyzer = TempoAnalyzer::new();
        let bpm = analyzer.estimate_bpm(&click_track(100.0, 12.0, 22050, 2));
        let bpm = bpm.value().expect("tempo should be known");
        assert!((bpm - 100.0).abs() < 2.0, "estimated {}", bpm);
    }

    #[test]
    fn test_silence_is_unknown() {
        let analyzer = TempoAnalyzer::new();
        let silent = AudioBuffer::silence(22050 * 5, 22050, 2);
        assert_eq!(analyzer.estimate_bpm(&silent), BpmEstimate::Unknown);
        assert!(analyzer.estimate_bpm_over_time(&silent).is_empty());
    }

    #[test]
    fn test_short_buffer_is_unknown() {
        let analyzer = TempoAnalyzer::new();
        let short = click_track(120.0, 0.5, 22050, 1);
        assert_eq!(analyzer.estimate_bpm(&short), BpmEstimate::Unknown);

        let empty = AudioBuffer::silence(0, 22050, 1);
        assert_eq!(analyzer.estimate_bpm(&empty), BpmEstimate::Unknown);
    }

    #[test]
    fn test_invalid_config_degrades_to_unknown() {
        let config = AnalysisConfig {
            window_size: 1000,
            ..Default::default()
        };
        let analyzer = TempoAnalyzer::with_config(config);
        let bpm = analyzer.estimate_bpm(&click_track(120.0, 6.0, 22050, 1));
        assert_eq!(bpm, BpmEstimate::Unknown);
    }

    #[test]
    fn test_tempo_curve_follows_beats() {
        let analyzer = TempoAnalyzer::new();
        let analysis = analyzer.analyze(&click_track(120.0, 10.0, 22050, 1));

        assert!(analysis.beats.len() >= 15);
        assert!(analysis.beats.windows(2).all(|w| w[1] > w[0]));

        let curve = analyzer.estimate_bpm_over_time(&click_track(120.0, 10.0, 22050, 1));
        assert_eq!(curve.len(), analysis.beats.len() - 1);

        let mean = curve.iter().map(|p| p.bpm).sum::<f32>() / curve.len() as f32;
        assert!((mean - 120.0).abs() < 3.0, "mean instantaneous bpm {}", mean);
    }

    #[test]
    fn test_autocorrelation_of_periodic_signal() {
        let signal: Vec<f32> = (0..256).map(|i| if i % 8 == 0 { 1.0 } else { 0.0 }).collect();
        let ac = autocorrelate(&signal).unwrap();
        assert!((ac[0] - 1.0).abs() < 1e-5);
        assert!(ac[8] > ac[4]);
        assert!(ac[8] > ac[7]);
    }

    #[test]
    fn test_autocorrelation_of_constant_fails() {
        assert!(autocorrelate(&[0.5; 64]).is_err());
    }
}
