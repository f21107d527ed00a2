//! Error types for mediascribe.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScribeError {
    // Configuration errors
    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Request errors
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    // Decoder errors
    #[error("{decoder} not found. {hint}")]
    DecoderNotFound { decoder: String, hint: String },

    #[error("{}", decoder_failed_message(.exit_code, .command, .stderr))]
    DecoderFailed {
        exit_code: Option<i32>,
        command: String,
        stderr: String,
    },

    // Recognition errors
    #[error("Recognition model not found: {model} (looked in {searched})")]
    ModelNotFound { model: String, searched: String },

    #[error("Failed to initialize recognition backend: {message}")]
    BackendInitFailed { message: String },

    #[error("Recognition failed: {message}")]
    RecognitionFailed { message: String },

    // Output errors
    #[error("Failed to write {path}: {message}")]
    WriteFailed { path: String, message: String },

    #[error("Cancelled")]
    Cancelled,

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScribeError {
    /// True for user-initiated cancellation, which is a terminal status rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ScribeError::Cancelled)
    }
}

fn decoder_failed_message(exit_code: &Option<i32>, command: &str, stderr: &str) -> String {
    let status = match exit_code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    };
    format!(
        "ffmpeg failed to extract audio ({})\nCommand: {}\nstderr:\n{}",
        status,
        command,
        stderr.trim_end()
    )
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, ScribeError>;
