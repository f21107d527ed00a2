//! WAV loading for the recognition backend.

use crate::defaults::SAMPLE_RATE;
use crate::error::{Result, ScribeError};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Decoded audio, normalized to 16kHz mono 16-bit PCM.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmAudio {
    pub samples: Vec<i16>,
}

impl PcmAudio {
    /// Duration in seconds at the normalized sample rate.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / SAMPLE_RATE as f64
    }

    /// Open a WAV file from disk.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| ScribeError::RecognitionFailed {
            message: format!("Failed to open {}: {}", path.display(), e),
        })?;
        Self::from_reader(BufReader::new(file))
    }

    /// Parse WAV data from any reader.
    ///
    /// Integer PCM only. Stereo is downmixed and other sample rates are
    /// resampled linearly to 16kHz.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut wav_reader = hound::WavReader::new(reader).map_err(|e| ScribeError::RecognitionFailed {
            message: format!("Failed to parse WAV file: {}", e),
        })?;

        let spec = wav_reader.spec();
        if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
            return Err(ScribeError::RecognitionFailed {
                message: format!(
                    "Unsupported WAV format: {} bits {:?} (expected 16-bit PCM)",
                    spec.bits_per_sample, spec.sample_format
                ),
            });
        }

        let raw_samples: Vec<i16> = wav_reader
            .samples::<i16>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| ScribeError::RecognitionFailed {
                message: format!("Failed to read WAV samples: {}", e),
            })?;

        let mono = downmix(raw_samples, spec.channels);
        let samples = resample(&mono, spec.sample_rate, SAMPLE_RATE);

        Ok(Self { samples })
    }

    /// Samples as f32 normalized to [-1.0, 1.0], the layout whisper expects.
    pub fn to_f32(&self) -> Vec<f32> {
        self.samples
            .iter()
            .map(|&sample| sample as f32 / 32768.0)
            .collect()
    }
}

fn downmix(samples: Vec<i16>, channels: u16) -> Vec<i16> {
    if channels <= 1 {
        return samples;
    }
    let channels = channels as usize;
    samples
        .chunks_exact(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = (source_pos.floor() as usize).min(samples.len() - 1);
            let fraction = source_pos - source_idx as f64;

            if source_idx + 1 >= samples.len() {
                samples[source_idx]
            } else {
                let left = samples[source_idx] as f64;
                let right = samples[source_idx + 1] as f64;
                (left + (right - left) * fraction) as i16
            }
        })
        .collect()
}
