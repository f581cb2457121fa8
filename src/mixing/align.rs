//! Tempo alignment by rate-scaled resampling.

use crate::audio::{rate_scaled_resample, resample, AudioBuffer, BpmEstimate, TempoEstimator};
use crate::error::Result;

/// Estimate both tempos concurrently; the inputs are disjoint and read-only
pub fn estimate_pair(
    estimator: &dyn TempoEstimator,
    a: &AudioBuffer,
    b: &AudioBuffer,
) -> (BpmEstimate, BpmEstimate) {
    rayon::join(|| estimator.estimate_bpm(a), || estimator.estimate_bpm(b))
}

/// Playback rate that brings `adjust` to `reference`, if both tempos are usable
pub fn playback_rate(reference: BpmEstimate, adjust: BpmEstimate) -> Option<f64> {
    match (reference.value(), adjust.value()) {
        (Some(bpm_ref), Some(bpm_adj)) if bpm_adj > 0.0 => Some(bpm_ref as f64 / bpm_adj as f64),
        _ => None,
    }
}

/// Re-render `to_adjust` at the rate implied by two tempo estimates
///
/// With an unknown tempo on either side the buffer comes back unchanged.
/// Otherwise the result plays `bpm_ref / bpm_adj` times faster (pitch moves
/// with it) and is delivered at `target_rate`.
pub fn align_with_estimates(
    to_adjust: &AudioBuffer,
    bpm_ref: BpmEstimate,
    bpm_adj: BpmEstimate,
    target_rate: u32,
) -> Result<AudioBuffer> {
    let Some(rate) = playback_rate(bpm_ref, bpm_adj) else {
        tracing::info!(
            "Tempo unknown (reference: {}, track: {}), skipping rate adjustment",
            bpm_ref,
            bpm_adj
        );
        return Ok(to_adjust.clone());
    };

    tracing::info!(
        "Aligning tempo {} -> {} (playback rate {:.4})",
        bpm_adj,
        bpm_ref,
        rate
    );
    rate_scaled_resample(to_adjust, rate, target_rate)
}

/// Tempo-align `to_adjust` to `reference`
pub fn align_tempo(
    estimator: &dyn TempoEstimator,
    reference: &AudioBuffer,
    to_adjust: &AudioBuffer,
) -> Result<AudioBuffer> {
    let (bpm_ref, bpm_adj) = estimate_pair(estimator, reference, to_adjust);
    align_with_estimates(to_adjust, bpm_ref, bpm_adj, reference.sample_rate())
}

/// Bring `track` to the channel count and sample rate of `reference`
pub fn conform_to(track: &AudioBuffer, reference: &AudioBuffer) -> Result<AudioBuffer> {
    let track = track.with_channels(reference.channels())?;
    if track.sample_rate() == reference.sample_rate() {
        return Ok(track);
    }

    tracing::debug!(
        "Converting track from {} Hz to {} Hz",
        track.sample_rate(),
        reference.sample_rate()
    );
    resample(&track, reference.sample_rate())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    struct Fixed(BpmEstimate, BpmEstimate);

    impl TempoEstimator for Fixed {
        fn estimate_bpm(&self, buffer: &AudioBuffer) -> BpmEstimate {
            // Tell the two tracks apart by their first sample
            if buffer.samples().first().copied().unwrap_or(0.0) > 0.0 {
                self.0
            } else {
                self.1
            }
        }
    }

    fn marked(marker: f32, frames: usize, rate: u32) -> AudioBuffer {
        let mut samples = vec![0.1f32; frames];
        samples[0] = marker;
        AudioBuffer::mono(samples, rate).unwrap()
    }

    #[test]
    fn test_playback_rate() {
        let rate = playback_rate(BpmEstimate::Global(120.0), BpmEstimate::Global(100.0)).unwrap();
        assert_relative_eq!(rate, 1.2, epsilon = 1e-9);
        assert!(playback_rate(BpmEstimate::Unknown, BpmEstimate::Global(100.0)).is_none());
        assert!(playback_rate(BpmEstimate::Global(100.0), BpmEstimate::Unknown).is_none());
    }

    #[test]
    fn test_unknown_tempo_is_noop() {
        let reference = marked(1.0, 8000, 8000);
        let track = marked(-1.0, 6000, 8000);
        let estimator = Fixed(BpmEstimate::Global(120.0), BpmEstimate::Unknown);

        let aligned = align_tempo(&estimator, &reference, &track).unwrap();
        assert_eq!(aligned, track);
    }

    #[test]
    fn test_faster_reference_shortens_track() {
        let reference = marked(1.0, 8000, 8000);
        let track = marked(-1.0, 12000, 8000);
        let estimator = Fixed(BpmEstimate::Global(120.0), BpmEstimate::Global(100.0));

        let aligned = align_tempo(&estimator, &reference, &track).unwrap();
        assert_eq!(aligned.frames(), 10000);
        assert_eq!(aligned.sample_rate(), 8000);
    }

    #[test]
    fn test_output_uses_reference_rate() {
        let reference = marked(1.0, 4800, 48000);
        let track = marked(-1.0, 4410, 44100);
        let estimator = Fixed(BpmEstimate::Global(100.0), BpmEstimate::Global(100.0));

        let aligned = align_tempo(&estimator, &reference, &track).unwrap();
        assert_eq!(aligned.sample_rate(), 48000);
        assert_eq!(aligned.frames(), 4800);
    }

    #[test]
    fn test_conform_channels_and_rate() {
        let reference = AudioBuffer::silence(100, 8000, 2);
        let mono = AudioBuffer::mono(vec![0.25; 50], 8000).unwrap();
        let conformed = conform_to(&mono, &reference).unwrap();
        assert_eq!(conformed.channels(), 2);
        assert_eq!(conformed.frames(), 50);

        let surround = AudioBuffer::silence(10, 8000, 6);
        assert!(conform_to(&surround, &reference).is_err());
    }
}
