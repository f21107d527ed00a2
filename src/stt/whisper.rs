//! whisper.cpp recognition backend.
//!
//! # Feature Gate
//!
//! Real inference requires the `whisper` feature (cmake must be installed).
//! GPU devices additionally need the `cuda` or `metal` feature. Without
//! `whisper` the backend still resolves model files but every load fails with
//! `BackendInitFailed`.

use crate::defaults;
use crate::error::{Result, ScribeError};
use crate::models;
use crate::stt::backend::{RecognitionBackend, RecognitionModel};
use crate::stt::types::Device;
use flate2::Compression;
use flate2::write::ZlibEncoder;
use std::io::Write;
use std::path::{Path, PathBuf};

#[cfg(feature = "whisper")]
use crate::audio::vad::{self, SpeechMap, VadConfig};
#[cfg(feature = "whisper")]
use crate::audio::wav::PcmAudio;
#[cfg(feature = "whisper")]
use crate::stt::backend::RawTranscription;
#[cfg(feature = "whisper")]
use crate::stt::types::{DecodeOptions, RawRunInfo, RawSegment};
#[cfg(feature = "whisper")]
use std::sync::{Mutex, Once};
#[cfg(feature = "whisper")]
use whisper_rs::{
    FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, install_logging_hooks,
};

#[cfg(feature = "whisper")]
static LOGGING_HOOKS_INSTALLED: Once = Once::new();

/// Precisions accepted on the command line. ggml weights carry their own
/// quantization, so these only steer model file selection.
pub const COMPUTE_TYPES: &[&str] = &[
    "int8",
    "int8_float16",
    "int8_float32",
    "int16",
    "float16",
    "bfloat16",
    "float32",
];

/// Recognition backend backed by whisper.cpp models in a directory.
#[derive(Debug, Clone)]
pub struct WhisperBackend {
    models_dir: PathBuf,
    /// Number of threads for inference (None = whisper.cpp default)
    threads: Option<usize>,
}

impl WhisperBackend {
    pub fn new(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: models_dir.into(),
            threads: None,
        }
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// Validate the precision and device, then locate the model file.
    fn prepare(&self, model: &str, device: Device, compute_type: &str) -> Result<PathBuf> {
        if !COMPUTE_TYPES.contains(&compute_type) {
            return Err(ScribeError::BackendInitFailed {
                message: format!(
                    "unsupported compute type '{}' (expected one of: {})",
                    compute_type,
                    COMPUTE_TYPES.join(", ")
                ),
            });
        }
        if !device_compiled(device) {
            return Err(ScribeError::BackendInitFailed {
                message: format!(
                    "device {} not available in this build (GPU backend: {})",
                    device,
                    defaults::gpu_backend()
                ),
            });
        }
        models::resolve_model_path(&self.models_dir, model, compute_type)
    }
}

/// Whether this build can run on `device`.
pub fn device_compiled(device: Device) -> bool {
    match device {
        Device::Cpu => true,
        Device::Cuda => cfg!(feature = "cuda"),
        Device::Metal => cfg!(feature = "metal"),
        Device::Auto => false,
    }
}

/// Ratio of UTF-8 length to zlib-compressed length.
///
/// High values indicate repetitive output, a typical hallucination symptom.
pub fn compression_ratio(text: &str) -> Option<f64> {
    if text.is_empty() {
        return None;
    }
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text.as_bytes()).ok()?;
    let compressed = encoder.finish().ok()?;
    if compressed.is_empty() {
        return None;
    }
    Some(text.len() as f64 / compressed.len() as f64)
}

/// Language recorded for audio that was never decoded.
///
/// An explicit request is kept; `auto` was never resolved, so nothing is claimed.
#[cfg_attr(not(feature = "whisper"), allow(dead_code))]
fn undecoded_language(requested: &str) -> String {
    if requested == defaults::AUTO_LANGUAGE {
        String::new()
    } else {
        requested.to_string()
    }
}

/// Mean natural log of token probabilities.
pub fn average_logprob(probabilities: &[f32]) -> Option<f64> {
    if probabilities.is_empty() {
        return None;
    }
    let sum: f64 = probabilities
        .iter()
        .map(|&p| (p.max(f32::MIN_POSITIVE) as f64).ln())
        .sum();
    Some(sum / probabilities.len() as f64)
}

#[cfg(feature = "whisper")]
impl RecognitionBackend for WhisperBackend {
    fn name(&self) -> &str {
        "whisper"
    }

    fn load(
        &self,
        model: &str,
        device: Device,
        compute_type: &str,
    ) -> Result<Box<dyn RecognitionModel>> {
        // Suppress whisper.cpp output (only once)
        LOGGING_HOOKS_INSTALLED.call_once(|| {
            install_logging_hooks();
        });

        let model_path = self.prepare(model, device, compute_type)?;
        tracing::debug!(path = %model_path.display(), %device, compute_type, "loading whisper model");

        let mut context_params = WhisperContextParameters::default();
        context_params.use_gpu(device.is_gpu());
        // Fused attention kernels avoid the standalone softmax kernel on newer GPUs
        context_params.flash_attn(device.is_gpu());

        let path_str = model_path
            .to_str()
            .ok_or_else(|| ScribeError::BackendInitFailed {
                message: "Invalid UTF-8 in model path".to_string(),
            })?;
        let context = WhisperContext::new_with_params(path_str, context_params).map_err(|e| {
            ScribeError::BackendInitFailed {
                message: format!("Failed to load {}: {}", model_path.display(), e),
            }
        })?;

        Ok(Box::new(WhisperModel {
            context: Mutex::new(context),
            threads: self.threads,
        }))
    }
}

#[cfg(not(feature = "whisper"))]
impl RecognitionBackend for WhisperBackend {
    fn name(&self) -> &str {
        "whisper"
    }

    fn load(
        &self,
        model: &str,
        device: Device,
        compute_type: &str,
    ) -> Result<Box<dyn RecognitionModel>> {
        self.prepare(model, device, compute_type)?;
        Err(ScribeError::BackendInitFailed {
            message: concat!(
                "Whisper feature not enabled. This binary was built without speech recognition.\n",
                "To fix: cargo build --release (whisper is enabled by default)\n",
                "If build fails with cmake errors, install: sudo apt install cmake"
            )
            .to_string(),
        })
    }
}

/// A whisper.cpp context loaded on one device.
#[cfg(feature = "whisper")]
struct WhisperModel {
    context: Mutex<WhisperContext>,
    threads: Option<usize>,
}

#[cfg(feature = "whisper")]
impl WhisperModel {
    fn run(&self, audio: &[f32], options: &DecodeOptions) -> Result<(String, Vec<RawSegment>)> {
        let context = self
            .context
            .lock()
            .map_err(|e| ScribeError::RecognitionFailed {
                message: format!("Failed to acquire context lock: {}", e),
            })?;

        let mut state = context
            .create_state()
            .map_err(|e| ScribeError::RecognitionFailed {
                message: format!("Failed to create Whisper state: {}", e),
            })?;

        let mut params = FullParams::new(SamplingStrategy::BeamSearch {
            beam_size: i32::try_from(options.beam_size).unwrap_or(i32::MAX),
            patience: -1.0,
        });

        if options.language == defaults::AUTO_LANGUAGE {
            params.set_language(None);
        } else {
            params.set_language(Some(&options.language));
        }
        if let Some(threads) = self.threads {
            params.set_n_threads(i32::try_from(threads).unwrap_or(i32::MAX));
        }

        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        state
            .full(params, audio)
            .map_err(|e| ScribeError::RecognitionFailed {
                message: format!("Whisper inference failed: {}", e),
            })?;

        let lang_id = state.full_lang_id_from_state();
        let language = whisper_rs::get_lang_str(lang_id)
            .unwrap_or(options.language.as_str())
            .to_string();

        let segments = state
            .as_iter()
            .map(|segment| {
                let text = segment.to_string();
                let probabilities: Vec<f32> = (0..segment.n_tokens())
                    .filter_map(|i| segment.get_token(i))
                    .map(|token| token.token_probability())
                    .collect();
                RawSegment {
                    // whisper.cpp timestamps are in centiseconds
                    start: segment.start_timestamp() as f64 / 100.0,
                    end: segment.end_timestamp() as f64 / 100.0,
                    avg_logprob: average_logprob(&probabilities),
                    no_speech_prob: Some(segment.no_speech_probability() as f64),
                    compression_ratio: compression_ratio(text.trim()),
                    text,
                }
            })
            .collect();

        Ok((language, segments))
    }
}

#[cfg(feature = "whisper")]
impl RecognitionModel for WhisperModel {
    fn transcribe(&self, audio_path: &Path, options: &DecodeOptions) -> Result<RawTranscription> {
        let pcm = PcmAudio::open(audio_path)?;
        let duration = pcm.duration_secs();

        // A forced language is certain; whisper.cpp does not expose the detection score.
        let language_probability = (options.language != defaults::AUTO_LANGUAGE).then_some(1.0);

        let (language, segments, duration_after_vad) = if options.vad_filter {
            let regions = vad::detect_speech(&pcm.samples, defaults::SAMPLE_RATE, &VadConfig::default());
            let map = SpeechMap::new(&regions, defaults::SAMPLE_RATE);
            tracing::debug!(
                regions = regions.len(),
                speech_secs = map.speech_duration(),
                "voice activity detection"
            );
            if regions.is_empty() {
                (undecoded_language(&options.language), Vec::new(), 0.0)
            } else {
                let speech = PcmAudio {
                    samples: vad::collect_speech(&pcm.samples, &regions),
                };
                let (language, segments) = self.run(&speech.to_f32(), options)?;
                let segments = segments
                    .into_iter()
                    .map(|segment| {
                        let start = map.map_start(segment.start);
                        let end = map.map_end(segment.end).max(start);
                        RawSegment {
                            start,
                            end,
                            ..segment
                        }
                    })
                    .collect();
                (language, segments, map.speech_duration())
            }
        } else {
            let (language, segments) = self.run(&pcm.to_f32(), options)?;
            (language, segments, duration)
        };

        Ok(RawTranscription {
            info: RawRunInfo {
                language,
                language_probability,
                duration,
                duration_after_vad,
            },
            segments: Box::new(segments.into_iter().map(Ok::<RawSegment, ScribeError>)),
        })
    }
}
