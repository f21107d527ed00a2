//! Recognition data types shared by the adapter, backends and output writer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Compute device for the recognition backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    /// Try the platform's GPU backend first, then fall back to CPU.
    #[default]
    Auto,
    Cpu,
    #[serde(alias = "gpu-cuda")]
    Cuda,
    #[serde(alias = "gpu-metal")]
    Metal,
}

impl Device {
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Auto => "auto",
            Device::Cpu => "cpu",
            Device::Cuda => "cuda",
            Device::Metal => "metal",
        }
    }

    pub fn is_gpu(&self) -> bool {
        matches!(self, Device::Cuda | Device::Metal)
    }

    /// Precision used when the caller did not choose one.
    ///
    /// GPUs run half precision well; on CPU 8-bit quantization is the fastest
    /// and smallest option.
    pub fn default_compute_type(&self) -> &'static str {
        if self.is_gpu() { "float16" } else { "int8" }
    }

    /// Devices tried in order for `Device::Auto` on this platform.
    pub fn auto_candidates() -> &'static [Device] {
        if cfg!(target_os = "macos") {
            &[Device::Metal, Device::Cpu]
        } else {
            &[Device::Cuda, Device::Cpu]
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "" => Ok(Device::Auto),
            "cpu" => Ok(Device::Cpu),
            "cuda" | "gpu-cuda" => Ok(Device::Cuda),
            "metal" | "gpu-metal" => Ok(Device::Metal),
            other => Err(format!(
                "unknown device '{}' (expected auto, cpu, gpu-cuda or gpu-metal)",
                other
            )),
        }
    }
}

/// Parameters of a single decoding request.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeOptions {
    /// Language code, or "auto" for detection.
    pub language: String,
    pub beam_size: u32,
    pub vad_filter: bool,
}

/// Run metadata as reported by a backend.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawRunInfo {
    pub language: String,
    pub language_probability: Option<f64>,
    pub duration: f64,
    pub duration_after_vad: f64,
}

/// A segment as emitted by a backend, before normalization.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
    pub avg_logprob: Option<f64>,
    pub no_speech_prob: Option<f64>,
    pub compression_ratio: Option<f64>,
}

impl RawSegment {
    pub fn new(start: f64, end: f64, text: &str) -> Self {
        Self {
            start,
            end,
            text: text.to_string(),
            ..Default::default()
        }
    }
}

/// A time-bounded unit of recognized speech.
///
/// Diagnostics that the backend did not supply are `None` and serialize as `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimedSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
    pub avg_logprob: Option<f64>,
    pub no_speech_prob: Option<f64>,
    pub compression_ratio: Option<f64>,
}

impl From<RawSegment> for TimedSegment {
    fn from(raw: RawSegment) -> Self {
        let start = raw.start.max(0.0);
        Self {
            start,
            end: raw.end.max(start),
            text: raw.text.trim().to_string(),
            avg_logprob: raw.avg_logprob,
            no_speech_prob: raw.no_speech_prob,
            compression_ratio: raw.compression_ratio,
        }
    }
}

/// Metadata of one recognition run, written verbatim to the structured output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecognitionRun {
    pub language: String,
    pub language_probability: Option<f64>,
    pub duration: f64,
    pub duration_after_vad: f64,
    pub model_name: String,
    pub device: Device,
    pub compute_type: String,
    pub beam_size: u32,
    pub vad_filter: bool,
}
