use tracing::{debug, info};

use crate::{
    audio::{AudioBuffer, BpmEstimate, TempoAnalyzer, TempoEstimator},
    config::{Config, MixConfig},
    error::Result,
    mixing::{
        align::{align_with_estimates, conform_to, estimate_pair},
        ops::{cap_length, fade_in, fade_out, overlay},
        types::{MixRequest, MixResult, Strategy},
    },
};

/// Mix engine that turns two decoded tracks into one bounded-length clip
///
/// Every strategy follows the same pipeline:
/// 1. Tempo Estimation - Global BPM of both tracks (concurrently)
/// 2. Tempo Alignment - Rate-scaled resample of track B (beatmatch/automix)
/// 3. Composition - Fades and additive overlay
/// 4. Length Cap - Truncate and fade anything past the maximum duration
pub struct MixEngine {
    config: MixConfig,
    estimator: Box<dyn TempoEstimator>,
}

impl MixEngine {
    /// Engine using the built-in tempo analyzer
    pub fn new(config: &Config) -> Self {
        Self::with_estimator(
            config.mix.clone(),
            Box::new(TempoAnalyzer::with_config(config.analysis.clone())),
        )
    }

    /// Engine with a caller-supplied tempo estimator
    pub fn with_estimator(config: MixConfig, estimator: Box<dyn TempoEstimator>) -> Self {
        Self { config, estimator }
    }

    pub fn config(&self) -> &MixConfig {
        &self.config
    }

    /// Run a full mix request and collect tempo metrics
    pub fn mix(&self, request: &MixRequest) -> Result<MixResult> {
        request.validate()?;

        info!("🎚️  Mixing with strategy: {}", request.strategy);
        info!(
            "   Track A: {:.1}s, {} Hz, {} channels",
            request.track_a.duration(),
            request.track_a.sample_rate(),
            request.track_a.channels()
        );
        info!(
            "   Track B: {:.1}s, {} Hz, {} channels",
            request.track_b.duration(),
            request.track_b.sample_rate(),
            request.track_b.channels()
        );

        let (bpm_a, bpm_b) = estimate_pair(self.estimator.as_ref(), &request.track_a, &request.track_b);
        info!("   Tempo A: {}, Tempo B: {}", bpm_a, bpm_b);

        let a = &request.track_a;
        let aligned;
        let b = if request.strategy.aligns_tempo() {
            aligned = self.aligned_b(a, &request.track_b, bpm_a, bpm_b)?;
            &aligned
        } else {
            &request.track_b
        };

        let composed = match request.strategy {
            Strategy::Crossfade => {
                self.compose_crossfade(a, b, request.start_time, request.fade_duration)?
            }
            Strategy::Beatmatch => self.compose_beatmatch(a, b)?,
            Strategy::Automix => {
                self.compose_automix(a, b, request.start_time, request.fade_duration)?
            }
        };

        let buffer = self.cap(&composed);
        let bpm_out = self.estimator.estimate_bpm(&buffer);

        info!("🎉 Mix complete: {:.2}s, output tempo {}", buffer.duration(), bpm_out);

        Ok(MixResult {
            buffer,
            bpm_a,
            bpm_b,
            bpm_out,
            strategy_applied: request.strategy,
        })
    }

    /// Fade A out and B in over `[start_time, start_time + fade_duration]`
    ///
    /// Both inputs are bounded to that window: the result is A up to the end
    /// of the fade, never longer.
    pub fn crossfade(
        &self,
        track_a: &AudioBuffer,
        track_b: &AudioBuffer,
        start_time: f64,
        fade_duration: f64,
    ) -> Result<AudioBuffer> {
        let composed = self.compose_crossfade(track_a, track_b, start_time, fade_duration)?;
        Ok(self.cap(&composed))
    }

    /// Tempo-align B to A and play both from time zero
    pub fn beatmatch(&self, track_a: &AudioBuffer, track_b: &AudioBuffer) -> Result<AudioBuffer> {
        let (bpm_a, bpm_b) = estimate_pair(self.estimator.as_ref(), track_a, track_b);
        let aligned = self.aligned_b(track_a, track_b, bpm_a, bpm_b)?;
        let composed = self.compose_beatmatch(track_a, &aligned)?;
        Ok(self.cap(&composed))
    }

    /// Tempo-align B, crossfade it in at `start_time`, and let it play out
    pub fn automix(
        &self,
        track_a: &AudioBuffer,
        track_b: &AudioBuffer,
        start_time: f64,
        fade_duration: f64,
    ) -> Result<AudioBuffer> {
        let (bpm_a, bpm_b) = estimate_pair(self.estimator.as_ref(), track_a, track_b);
        let aligned = self.aligned_b(track_a, track_b, bpm_a, bpm_b)?;
        let composed = self.compose_automix(track_a, &aligned, start_time, fade_duration)?;
        Ok(self.cap(&composed))
    }

    fn cap(&self, buffer: &AudioBuffer) -> AudioBuffer {
        cap_length(buffer, self.config.max_duration, self.config.tail_fade)
    }

    fn aligned_b(
        &self,
        track_a: &AudioBuffer,
        track_b: &AudioBuffer,
        bpm_a: BpmEstimate,
        bpm_b: BpmEstimate,
    ) -> Result<AudioBuffer> {
        align_with_estimates(track_b, bpm_a, bpm_b, track_a.sample_rate())
    }

    /// A up to the end of the transition, faded out over its last `fade_duration`
    fn outgoing(&self, track_a: &AudioBuffer, start_time: f64, fade_duration: f64) -> AudioBuffer {
        let part1 = track_a.slice(0.0, start_time + fade_duration);
        fade_out(&part1, fade_duration)
    }

    fn compose_crossfade(
        &self,
        track_a: &AudioBuffer,
        track_b: &AudioBuffer,
        start_time: f64,
        fade_duration: f64,
    ) -> Result<AudioBuffer> {
        let track_b = conform_to(track_b, track_a)?;

        let part1 = self.outgoing(track_a, start_time, fade_duration);
        let part2 = fade_in(&track_b.slice(start_time, start_time + fade_duration), fade_duration);

        debug!(
            "Crossfade: part1 {:.2}s, part2 {:.2}s at {:.2}s",
            part1.duration(),
            part2.duration(),
            start_time
        );

        overlay(&part1, &part2, track_a.frame_at(start_time), false)
    }

    fn compose_beatmatch(&self, track_a: &AudioBuffer, aligned_b: &AudioBuffer) -> Result<AudioBuffer> {
        let aligned_b = conform_to(aligned_b, track_a)?;

        debug!(
            "Beatmatch: overlaying {:.2}s onto {:.2}s",
            aligned_b.duration(),
            track_a.duration()
        );

        overlay(track_a, &aligned_b, 0, true)
    }

    fn compose_automix(
        &self,
        track_a: &AudioBuffer,
        aligned_b: &AudioBuffer,
        start_time: f64,
        fade_duration: f64,
    ) -> Result<AudioBuffer> {
        let aligned_b = conform_to(aligned_b, track_a)?;

        let part1 = self.outgoing(track_a, start_time, fade_duration);
        let part2 = fade_in(&aligned_b.slice_from(start_time), fade_duration);

        // A shorter than the start time: join B directly after A, no silent gap
        let position = track_a.frame_at(start_time).min(part1.frames());

        debug!(
            "Automix: part1 {:.2}s, part2 {:.2}s at {:.2}s",
            part1.duration(),
            part2.duration(),
            position as f64 / track_a.sample_rate() as f64
        );

        overlay(&part1, &part2, position, true)
    }
}
