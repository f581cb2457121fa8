//! File decoding and encoding for the command-line front end.
//!
//! The mixing core only ever sees [`AudioBuffer`]s; this module is the
//! collaborator that turns files into buffers and back.

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tokio::task;

use crate::audio::types::AudioBuffer;
use crate::error::{AudioError, Result};

/// Audio file loader supporting multiple formats
pub struct AudioLoader;

impl AudioLoader {
    /// Load an audio file into a decoded buffer
    ///
    /// Decoding runs on the blocking pool, so several loads joined together
    /// decode in parallel.
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<AudioBuffer> {
        let path = path.as_ref().to_path_buf();
        let load_failed = AudioError::LoadFailed {
            path: path.display().to_string()
        };

        task::spawn_blocking(move || Self::load_blocking(&path))
            .await
            .map_err(|e| {
                tracing::error!("Decode task failed: {}", e);
                load_failed
            })?
    }

    /// Decode an audio file on the calling thread
    pub fn load_blocking<P: AsRef<Path>>(path: P) -> Result<AudioBuffer> {
        let path = path.as_ref();
        let extension = Self::detect_format(path).unwrap_or_default();

        match extension.as_str() {
            "wav" => Self::load_wav(path),
            "mp3" | "flac" | "ogg" | "m4a" | "aac" => Self::load_with_symphonia(path),
            _ => Err(AudioError::UnsupportedFormat {
                format: extension
            }.into()),
        }
    }

    /// Load WAV files using the hound crate (most reliable for WAV)
    fn load_wav(path: &Path) -> Result<AudioBuffer> {
        let load_failed = || AudioError::LoadFailed {
            path: path.display().to_string()
        };

        let reader = hound::WavReader::open(path).map_err(|_| load_failed())?;
        let spec = reader.spec();

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|_| load_failed())?,
            hound::SampleFormat::Int => {
                let bit_depth = spec.bits_per_sample;
                reader
                    .into_samples::<i32>()
                    .map(|sample| sample.map(|s| Self::int_to_float(s, bit_depth)))
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(|_| load_failed())?
            }
        };

        tracing::debug!(
            "Decoded WAV {:?}: {} Hz, {} channels, {} bits",
            path, spec.sample_rate, spec.channels, spec.bits_per_sample
        );

        AudioBuffer::new(samples, spec.sample_rate, spec.channels)
    }

    /// Load compressed formats using Symphonia
    fn load_with_symphonia(path: &Path) -> Result<AudioBuffer> {
        let load_failed = || AudioError::LoadFailed {
            path: path.display().to_string()
        };

        let file = File::open(path).map_err(|_| load_failed())?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        // Create a probe hint using the file extension
        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(extension);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|_| load_failed())?;

        let mut format = probed.format;

        // Find the first audio track with a known (decodable) codec
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(load_failed)?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let mut sample_rate = codec_params.sample_rate;
        let mut channels = codec_params.channels.map(|c| c.count() as u16);

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|_| load_failed())?;

        let mut samples = Vec::new();
        let mut sample_buf: Option<SampleBuffer<f32>> = None;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::ResetRequired) => {
                    decoder.reset();
                    continue;
                }
                Err(_) => break, // End of stream
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    tracing::warn!("Skipping undecodable packet: {}", e);
                    continue;
                }
                Err(_) => break,
            };

            let spec = *decoded.spec();
            if sample_rate.is_none() {
                sample_rate = Some(spec.rate);
            }
            if channels.is_none() {
                channels = Some(spec.channels.count() as u16);
            }

            if sample_buf.as_ref().map_or(true, |buf| buf.capacity() < decoded.capacity()) {
                sample_buf = Some(SampleBuffer::<f32>::new(decoded.capacity() as u64, spec));
            }
            if let Some(buf) = sample_buf.as_mut() {
                buf.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buf.samples());
            }
        }

        let sample_rate = sample_rate.ok_or_else(|| AudioError::InvalidBuffer {
            details: "No sample rate found".to_string()
        })?;
        let channels = channels.ok_or_else(|| AudioError::InvalidBuffer {
            details: "No channel information found".to_string()
        })?;

        tracing::debug!(
            "Decoded {:?}: {} Hz, {} channels, {} samples",
            path, sample_rate, channels, samples.len()
        );

        AudioBuffer::new(samples, sample_rate, channels)
    }

    /// Convert integer sample to float (-1.0 to 1.0)
    fn int_to_float(sample: i32, bit_depth: u16) -> f32 {
        match bit_depth {
            8 => sample as f32 / 128.0,
            16 => sample as f32 / 32768.0,
            24 => sample as f32 / 8388608.0,
            32 => sample as f32 / 2147483648.0,
            _ => sample as f32 / 32768.0, // Default to 16-bit
        }
    }

    /// Detect audio format from file extension
    pub fn detect_format<P: AsRef<Path>>(path: P) -> Option<String> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
    }

    /// Check if a file format is supported
    pub fn is_format_supported(extension: &str) -> bool {
        matches!(
            extension.to_lowercase().as_str(),
            "wav" | "mp3" | "flac" | "ogg" | "m4a" | "aac"
        )
    }
}

/// WAV encoder for finished mixes
pub struct AudioWriter;

impl AudioWriter {
    /// Write 16-bit PCM WAV, clipping to full scale
    pub fn write_wav<P: AsRef<Path>>(buffer: &AudioBuffer, path: P) -> Result<()> {
        let path = path.as_ref();
        let write_failed = || AudioError::WriteFailed {
            path: path.display().to_string()
        };

        let spec = hound::WavSpec {
            channels: buffer.channels(),
            sample_rate: buffer.sample_rate(),
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut writer = hound::WavWriter::create(path, spec).map_err(|_| write_failed())?;
        for &sample in buffer.samples() {
            let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
            writer.write_sample(value).map_err(|_| write_failed())?;
        }
        writer.finalize().map_err(|_| write_failed())?;

        tracing::debug!("Wrote {:.2}s to {:?}", buffer.duration(), path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_format_detection() {
        assert_eq!(AudioLoader::detect_format("test.wav"), Some("wav".to_string()));
        assert_eq!(AudioLoader::detect_format("test.MP3"), Some("mp3".to_string()));
        assert_eq!(AudioLoader::detect_format("test"), None);
    }

    #[test]
    fn test_format_support() {
        assert!(AudioLoader::is_format_supported("wav"));
        assert!(AudioLoader::is_format_supported("FLAC"));
        assert!(!AudioLoader::is_format_supported("xyz"));
    }

    #[test]
    fn test_int_to_float_conversion() {
        assert_eq!(AudioLoader::int_to_float(0, 16), 0.0);
        assert_eq!(AudioLoader::int_to_float(32767, 16), 32767.0 / 32768.0);
        assert_eq!(AudioLoader::int_to_float(-32768, 16), -1.0);
        assert_eq!(AudioLoader::int_to_float(-8388608, 24), -1.0);
    }

    #[tokio::test]
    async fn test_unsupported_format() {
        let temp_dir = tempdir().unwrap();
        let file_path = temp_dir.path().join("test.xyz");

        let mut file = File::create(&file_path).unwrap();
        file.write_all(b"dummy content").unwrap();

        let result = AudioLoader::load(&file_path).await;
        if let Err(crate::error::MixerError::Audio(AudioError::UnsupportedFormat { format })) = result {
            assert_eq!(format, "xyz");
        } else {
            panic!("Expected UnsupportedFormat error");
        }
    }

    #[tokio::test]
    async fn test_wav_write_then_load() {
        let temp_dir = tempdir().unwrap();
        let file_path = temp_dir.path().join("mix.wav");

        let samples: Vec<f32> = (0..200).map(|i| ((i % 20) as f32 - 10.0) / 20.0).collect();
        let buffer = AudioBuffer::new(samples, 22050, 2).unwrap();

        AudioWriter::write_wav(&buffer, &file_path).unwrap();
        let loaded = AudioLoader::load(&file_path).await.unwrap();

        assert_eq!(loaded.sample_rate(), 22050);
        assert_eq!(loaded.channels(), 2);
        assert_eq!(loaded.frames(), 100);
        for (a, b) in loaded.samples().iter().zip(buffer.samples()) {
            assert!((a - b).abs() < 1e-3);
        }
    }

    #[tokio::test]
    async fn test_joined_loads_decode_both_tracks() {
        let temp_dir = tempdir().unwrap();
        let mono_path = temp_dir.path().join("a.wav");
        let stereo_path = temp_dir.path().join("b.wav");
        AudioWriter::write_wav(&AudioBuffer::silence(800, 8000, 1), &mono_path).unwrap();
        AudioWriter::write_wav(&AudioBuffer::silence(400, 16000, 2), &stereo_path).unwrap();

        let (a, b) = tokio::try_join!(
            AudioLoader::load(&mono_path),
            AudioLoader::load(&stereo_path)
        )
        .unwrap();

        assert_eq!((a.frames(), a.sample_rate(), a.channels()), (800, 8000, 1));
        assert_eq!((b.frames(), b.sample_rate(), b.channels()), (400, 16000, 2));
        assert_eq!(AudioLoader::load_blocking(&mono_path).unwrap(), a);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let result = AudioLoader::load("/no/such/track.wav").await;
        assert!(matches!(
            result,
            Err(crate::error::MixerError::Audio(AudioError::LoadFailed { .. }))
        ));
    }
}
