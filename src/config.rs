use crate::audio::extract::ExtractorConfig;
use crate::defaults;
use crate::error::{Result, ScribeError};
use crate::models;
use crate::pipeline::orchestrator::PipelineConfig;
use crate::stt::types::Device;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Root for per-run scratch directories (None = system temp dir)
    pub scratch_dir: Option<PathBuf>,
    pub transcription: TranscriptionConfig,
    pub decoder: DecoderConfig,
    pub models: ModelsConfig,
}

/// Recognition defaults for every run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub model: String,
    pub language: String,
    pub device: Device,
    pub compute_type: Option<String>,
    pub beam_size: u32,
    pub vad_filter: bool,
    pub keep_audio: bool,
    pub output_dir: PathBuf,
}

/// External decoder configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DecoderConfig {
    /// Decoder executable (None = look up ffmpeg on PATH)
    pub path: Option<PathBuf>,
    #[serde(with = "duration_str")]
    pub poll_interval: Duration,
    #[serde(with = "duration_str")]
    pub grace_period: Duration,
}

/// Model storage configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ModelsConfig {
    /// Directory holding `ggml-<name>.bin` files (None = platform data dir)
    pub dir: Option<PathBuf>,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            model: defaults::DEFAULT_MODEL.to_string(),
            language: defaults::DEFAULT_LANGUAGE.to_string(),
            device: Device::Auto,
            compute_type: None,
            beam_size: defaults::DEFAULT_BEAM_SIZE,
            vad_filter: true,
            keep_audio: false,
            output_dir: PathBuf::from(defaults::DEFAULT_OUTPUT_DIR),
        }
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            path: None,
            poll_interval: defaults::DECODER_POLL_INTERVAL,
            grace_period: defaults::DECODER_GRACE_PERIOD,
        }
    }
}

impl ModelsConfig {
    /// Configured models directory, or the platform default.
    pub fn dir_or_default(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(models::default_models_dir)
    }
}

/// Durations as humantime strings ("100ms", "2s", "1m30s").
mod duration_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(s.trim()).map_err(serde::de::Error::custom)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML or invalid values.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(ScribeError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            other => other,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.transcription.beam_size == 0 {
            return Err(ScribeError::ConfigInvalidValue {
                key: "transcription.beam_size".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.decoder.poll_interval.is_zero() {
            return Err(ScribeError::ConfigInvalidValue {
                key: "decoder.poll_interval".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - MEDIASCRIBE_MODEL → transcription.model
    /// - MEDIASCRIBE_LANGUAGE → transcription.language
    /// - MEDIASCRIBE_DEVICE → transcription.device
    /// - MEDIASCRIBE_FFMPEG → decoder.path
    /// - MEDIASCRIBE_MODELS_DIR → models.dir
    ///
    /// Empty values are ignored.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(model) = env_value("MEDIASCRIBE_MODEL") {
            self.transcription.model = model;
        }

        if let Some(language) = env_value("MEDIASCRIBE_LANGUAGE") {
            self.transcription.language = language;
        }

        if let Some(device) = env_value("MEDIASCRIBE_DEVICE") {
            self.transcription.device =
                device
                    .parse()
                    .map_err(|message| ScribeError::ConfigInvalidValue {
                        key: "MEDIASCRIBE_DEVICE".to_string(),
                        message,
                    })?;
        }

        if let Some(path) = env_value("MEDIASCRIBE_FFMPEG") {
            self.decoder.path = Some(PathBuf::from(path));
        }

        if let Some(dir) = env_value("MEDIASCRIBE_MODELS_DIR") {
            self.models.dir = Some(PathBuf::from(dir));
        }

        Ok(self)
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/mediascribe/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("mediascribe")
            .join("config.toml")
    }

    /// Pipeline settings derived from this configuration.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            extractor: ExtractorConfig {
                decoder: self.decoder.path.clone(),
                poll_interval: self.decoder.poll_interval,
                grace_period: self.decoder.grace_period,
            },
            scratch_dir: self.scratch_dir.clone(),
        }
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}
