//! Data types for the transcription pipeline.

use crate::defaults;
use crate::error::{Result, ScribeError};
use crate::sanitize::sanitize;
use crate::stt::types::Device;
use std::fmt;
use std::path::{Path, PathBuf};

/// Everything one invocation needs. Never mutated by the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptionRequest {
    /// Input media file (anything the decoder can read).
    pub input: PathBuf,
    pub output_dir: PathBuf,
    /// Model name or path to a model file.
    pub model: String,
    /// Language code, or "auto" for detection.
    pub language: String,
    pub device: Device,
    /// Explicit precision; `None` picks one based on the device.
    pub compute_type: Option<String>,
    pub beam_size: u32,
    pub vad_filter: bool,
    /// Keep the extracted WAV next to the outputs.
    pub keep_audio: bool,
}

impl TranscriptionRequest {
    /// Create a request with default recognition settings.
    pub fn new(input: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output_dir: output_dir.into(),
            model: defaults::DEFAULT_MODEL.to_string(),
            language: defaults::DEFAULT_LANGUAGE.to_string(),
            device: Device::Auto,
            compute_type: None,
            beam_size: defaults::DEFAULT_BEAM_SIZE,
            vad_filter: true,
            keep_audio: false,
        }
    }

    /// Check the request before any side effect happens.
    pub fn validate(&self) -> Result<()> {
        if self.beam_size == 0 {
            return Err(ScribeError::InvalidRequest {
                message: "beam size must be at least 1".to_string(),
            });
        }
        if self.model.trim().is_empty() {
            return Err(ScribeError::InvalidRequest {
                message: "model must not be empty".to_string(),
            });
        }
        if !self.input.is_file() {
            return Err(ScribeError::InvalidRequest {
                message: format!("input file not found: {}", self.input.display()),
            });
        }
        Ok(())
    }

    /// Output base name: the sanitized input file stem.
    pub fn base_name(&self) -> String {
        let stem = self
            .input
            .file_stem()
            .map(|s| s.to_string_lossy())
            .unwrap_or_default();
        sanitize(&stem)
    }

    /// Paths the run will produce for this request.
    pub fn planned_outputs(&self) -> TranscriptionOutputs {
        TranscriptionOutputs::plan(&self.output_dir, &self.base_name(), self.keep_audio)
    }
}

/// The files a successful run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptionOutputs {
    pub base_name: String,
    pub output_dir: PathBuf,
    /// `<base>.segments.json`
    pub segments_json_path: PathBuf,
    /// `<base>.timestamps.txt`
    pub timestamps_txt_path: PathBuf,
    /// `<base>.wav`, only when the audio was kept.
    pub audio_path: Option<PathBuf>,
}

impl TranscriptionOutputs {
    fn plan(output_dir: &Path, base_name: &str, keep_audio: bool) -> Self {
        Self {
            base_name: base_name.to_string(),
            output_dir: output_dir.to_path_buf(),
            segments_json_path: output_dir.join(format!("{base_name}.segments.json")),
            timestamps_txt_path: output_dir.join(format!("{base_name}.timestamps.txt")),
            audio_path: keep_audio.then(|| output_dir.join(format!("{base_name}.wav"))),
        }
    }
}

/// Progress and outcome notifications from a run.
///
/// A run emits any number of `Log` events followed by exactly one terminal event.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    Log(String),
    Completed(TranscriptionOutputs),
    Cancelled,
    Failed(String),
}

impl PipelineEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PipelineEvent::Log(_))
    }
}

/// Stage of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    #[default]
    Initializing,
    Extracting,
    Transcribing,
    WritingOutputs,
    Completed,
    Cancelled,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::Completed | PipelineState::Cancelled | PipelineState::Failed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Initializing => "initializing",
            PipelineState::Extracting => "extracting",
            PipelineState::Transcribing => "transcribing",
            PipelineState::WritingOutputs => "writing outputs",
            PipelineState::Completed => "completed",
            PipelineState::Cancelled => "cancelled",
            PipelineState::Failed => "failed",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_request_defaults() {
        let request = TranscriptionRequest::new("talk.mp4", "out");
        assert_eq!(request.model, "small");
        assert_eq!(request.language, "en");
        assert_eq!(request.device, Device::Auto);
        assert_eq!(request.compute_type, None);
        assert_eq!(request.beam_size, 5);
        assert!(request.vad_filter);
        assert!(!request.keep_audio);
    }

    #[test]
    fn test_validate_rejects_zero_beam() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("a.mp4");
        std::fs::write(&input, b"x").unwrap();
        let mut request = TranscriptionRequest::new(&input, dir.path());
        assert!(request.validate().is_ok());
        request.beam_size = 0;
        assert!(matches!(
            request.validate(),
            Err(ScribeError::InvalidRequest { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_missing_input() {
        let dir = TempDir::new().unwrap();
        let request = TranscriptionRequest::new(dir.path().join("absent.mp4"), dir.path());
        match request.validate() {
            Err(ScribeError::InvalidRequest { message }) => {
                assert!(message.contains("absent.mp4"), "{message}");
            }
            other => panic!("expected InvalidRequest, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_directory_input() {
        let dir = TempDir::new().unwrap();
        let request = TranscriptionRequest::new(dir.path(), dir.path());
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_base_name_is_sanitized_stem() {
        let request = TranscriptionRequest::new("/media/Team: Q3 review?.mkv", "out");
        assert_eq!(request.base_name(), "Team_ Q3 review_");
        let reserved = TranscriptionRequest::new("/media/con.mp3", "out");
        assert_eq!(reserved.base_name(), "_con");
    }

    #[test]
    fn test_planned_outputs() {
        let mut request = TranscriptionRequest::new("/media/talk.mp4", "/tmp/out");
        let outputs = request.planned_outputs();
        assert_eq!(outputs.base_name, "talk");
        assert_eq!(outputs.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(
            outputs.segments_json_path,
            PathBuf::from("/tmp/out/talk.segments.json")
        );
        assert_eq!(
            outputs.timestamps_txt_path,
            PathBuf::from("/tmp/out/talk.timestamps.txt")
        );
        assert_eq!(outputs.audio_path, None);

        request.keep_audio = true;
        assert_eq!(
            request.planned_outputs().audio_path,
            Some(PathBuf::from("/tmp/out/talk.wav"))
        );
    }

    #[test]
    fn test_event_terminality() {
        assert!(!PipelineEvent::Log("x".to_string()).is_terminal());
        assert!(PipelineEvent::Cancelled.is_terminal());
        assert!(PipelineEvent::Failed("boom".to_string()).is_terminal());
    }

    #[test]
    fn test_state_terminality() {
        assert!(!PipelineState::Initializing.is_terminal());
        assert!(!PipelineState::Transcribing.is_terminal());
        assert!(PipelineState::Completed.is_terminal());
        assert!(PipelineState::Cancelled.is_terminal());
        assert!(PipelineState::Failed.is_terminal());
        assert_eq!(PipelineState::WritingOutputs.to_string(), "writing outputs");
    }
}
