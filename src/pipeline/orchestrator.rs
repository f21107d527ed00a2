//! Runs one transcription from media file to output files.

use crate::audio::extract::{AudioExtractor, ExtractorConfig};
use crate::cancel::CancellationToken;
use crate::defaults;
use crate::error::{Result, ScribeError};
use crate::pipeline::types::{
    PipelineEvent, PipelineState, TranscriptionOutputs, TranscriptionRequest,
};
use crate::stt::backend::RecognitionBackend;
use crate::stt::recognize::{RecognitionParams, recognize};
use crate::writer;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tempfile::TempDir;

/// Configuration for the pipeline.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Decoder location and supervision timings
    pub extractor: ExtractorConfig,
    /// Root for per-run scratch directories (None = system temp dir)
    pub scratch_dir: Option<PathBuf>,
}

/// Sequences extraction, recognition and output writing.
///
/// Reusable across runs, one run at a time.
pub struct Pipeline {
    extractor: AudioExtractor,
    scratch_dir: Option<PathBuf>,
    backend: Arc<dyn RecognitionBackend>,
    state: Mutex<PipelineState>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("extractor", &self.extractor)
            .field("scratch_dir", &self.scratch_dir)
            .field("backend", &self.backend.name())
            .field("state", &self.state())
            .finish()
    }
}

impl Pipeline {
    pub fn new(config: PipelineConfig, backend: Arc<dyn RecognitionBackend>) -> Self {
        Self {
            extractor: AudioExtractor::new(config.extractor),
            scratch_dir: config.scratch_dir,
            backend,
            state: Mutex::new(PipelineState::default()),
        }
    }

    /// Stage of the current (or last) run.
    pub fn state(&self) -> PipelineState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, next: PipelineState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = *state;
        tracing::debug!(from = %previous, to = %next, "pipeline state");
        *state = next;
    }

    /// Run one transcription.
    ///
    /// Emits `Log` events while working and exactly one terminal event at the
    /// end. Scratch audio is gone before the terminal event is emitted.
    pub fn run(
        &self,
        request: &TranscriptionRequest,
        token: &CancellationToken,
        on_event: &mut dyn FnMut(PipelineEvent),
    ) -> Result<TranscriptionOutputs> {
        self.set_state(PipelineState::Initializing);
        let result = self.run_stages(request, token, on_event);

        match &result {
            Ok(outputs) => {
                self.set_state(PipelineState::Completed);
                on_event(PipelineEvent::Completed(outputs.clone()));
            }
            Err(e) if e.is_cancelled() => {
                tracing::info!(input = %request.input.display(), "transcription cancelled");
                self.set_state(PipelineState::Cancelled);
                on_event(PipelineEvent::Cancelled);
            }
            Err(e) => {
                tracing::debug!(input = %request.input.display(), error = %e, "transcription failed");
                self.set_state(PipelineState::Failed);
                on_event(PipelineEvent::Failed(e.to_string()));
            }
        }
        result
    }

    fn run_stages(
        &self,
        request: &TranscriptionRequest,
        token: &CancellationToken,
        on_event: &mut dyn FnMut(PipelineEvent),
    ) -> Result<TranscriptionOutputs> {
        let mut log = |message: &str| on_event(PipelineEvent::Log(message.to_string()));

        request.validate()?;
        let outputs = request.planned_outputs();
        fs::create_dir_all(&outputs.output_dir).map_err(|e| ScribeError::WriteFailed {
            path: outputs.output_dir.display().to_string(),
            message: e.to_string(),
        })?;

        let input_name = request
            .input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        log(&format!("Input: {}", input_name));

        // Extracting
        self.set_state(PipelineState::Extracting);
        log("Extracting audio with ffmpeg…");
        token.check()?;

        // Decode into scratch; only a complete WAV reaches the output directory.
        let scratch = self.create_scratch_dir()?;
        let scratch_wav = scratch.path().join(format!("{}.wav", outputs.base_name));
        self.extractor.extract(
            &request.input,
            &scratch_wav,
            defaults::SAMPLE_RATE,
            defaults::CHANNELS,
            token,
        )?;
        let wav_path = match &outputs.audio_path {
            Some(kept) => {
                persist_audio(&scratch_wav, kept)?;
                kept.clone()
            }
            None => scratch_wav,
        };

        // Transcribing
        self.set_state(PipelineState::Transcribing);
        log("Transcribing… (this may take a while on first run)");
        token.check()?;

        let params = RecognitionParams {
            model: request.model.clone(),
            language: request.language.clone(),
            device: request.device,
            compute_type: request.compute_type.clone(),
            beam_size: request.beam_size,
            vad_filter: request.vad_filter,
        };
        let (run, segments) = recognize(self.backend.as_ref(), &wav_path, &params, token, &mut |m| {
            log(&m)
        })?;

        // Writing outputs
        self.set_state(PipelineState::WritingOutputs);
        log("Writing outputs…");
        token.check()?;

        writer::write_outputs(
            &segments,
            &run,
            &outputs.segments_json_path,
            &outputs.timestamps_txt_path,
        )?;

        let scratch_path = scratch.path().to_path_buf();
        if let Err(e) = scratch.close() {
            tracing::warn!(path = %scratch_path.display(), error = %e, "failed to remove scratch directory");
        }

        log("Done.");
        Ok(outputs)
    }

    pub(crate) fn mark_failed(&self) {
        self.set_state(PipelineState::Failed);
    }

    fn create_scratch_dir(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(defaults::SCRATCH_PREFIX);
        let dir = match &self.scratch_dir {
            Some(root) => {
                fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        tracing::debug!(path = %dir.path().display(), "created scratch directory");
        Ok(dir)
    }
}

/// Move a fully extracted WAV from scratch to its kept location.
///
/// Falls back to copying when the two paths are on different filesystems.
fn persist_audio(from: &Path, to: &Path) -> Result<()> {
    let write_failed = |e: std::io::Error| ScribeError::WriteFailed {
        path: to.display().to_string(),
        message: e.to_string(),
    };
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    if let Err(e) = fs::copy(from, to) {
        if let Err(cleanup) = fs::remove_file(to)
            && cleanup.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(path = %to.display(), error = %cleanup, "failed to remove partial audio copy");
        }
        return Err(write_failed(e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stt::backend::MockBackend;

    fn pipeline_with(backend: MockBackend, scratch: &TempDir) -> Pipeline {
        Pipeline::new(
            PipelineConfig {
                extractor: ExtractorConfig::default(),
                scratch_dir: Some(scratch.path().to_path_buf()),
            },
            Arc::new(backend),
        )
    }

    fn collect(
        pipeline: &Pipeline,
        request: &TranscriptionRequest,
        token: &CancellationToken,
    ) -> (Result<TranscriptionOutputs>, Vec<PipelineEvent>) {
        let mut events = Vec::new();
        let result = pipeline.run(request, token, &mut |e| events.push(e));
        (result, events)
    }

    #[test]
    fn test_invalid_request_fails_without_side_effects() {
        let dir = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        let out = dir.path().join("out");
        let request = TranscriptionRequest::new(dir.path().join("missing.mp4"), &out);
        let pipeline = pipeline_with(MockBackend::new(), &scratch);

        let (result, events) = collect(&pipeline, &request, &CancellationToken::new());
        assert!(matches!(result, Err(ScribeError::InvalidRequest { .. })));
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], PipelineEvent::Failed(_)));
        assert!(!out.exists());
        assert_eq!(pipeline.state(), PipelineState::Failed);
    }

    #[test]
    fn test_cancel_before_extraction() {
        let dir = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        let input = dir.path().join("talk.mp4");
        fs::write(&input, b"media").unwrap();
        let out = dir.path().join("out");
        let backend = MockBackend::new();
        let pipeline = pipeline_with(backend.clone(), &scratch);

        let token = CancellationToken::new();
        token.cancel();
        let (result, events) = collect(&pipeline, &TranscriptionRequest::new(&input, &out), &token);

        assert!(matches!(result, Err(ScribeError::Cancelled)));
        assert_eq!(events.last(), Some(&PipelineEvent::Cancelled));
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
        assert_eq!(fs::read_dir(&out).unwrap().count(), 0);
        assert_eq!(fs::read_dir(scratch.path()).unwrap().count(), 0);
        assert!(backend.load_attempts().is_empty());
        assert_eq!(pipeline.state(), PipelineState::Cancelled);
    }

    #[test]
    fn test_missing_decoder_fails_and_cleans_scratch() {
        let dir = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        let input = dir.path().join("talk.mp4");
        fs::write(&input, b"media").unwrap();
        let pipeline = Pipeline::new(
            PipelineConfig {
                extractor: ExtractorConfig {
                    decoder: Some(dir.path().join("no-such-ffmpeg")),
                    ..ExtractorConfig::default()
                },
                scratch_dir: Some(scratch.path().to_path_buf()),
            },
            Arc::new(MockBackend::new()),
        );

        let (result, events) = collect(
            &pipeline,
            &TranscriptionRequest::new(&input, dir.path().join("out")),
            &CancellationToken::new(),
        );
        assert!(matches!(result, Err(ScribeError::DecoderNotFound { .. })));
        assert!(matches!(events.last(), Some(PipelineEvent::Failed(_))));
        assert_eq!(fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_log_messages_before_failure() {
        let dir = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        let input = dir.path().join("talk.mp4");
        fs::write(&input, b"media").unwrap();
        let pipeline = Pipeline::new(
            PipelineConfig {
                extractor: ExtractorConfig {
                    decoder: Some(dir.path().join("no-such-ffmpeg")),
                    ..ExtractorConfig::default()
                },
                scratch_dir: Some(scratch.path().to_path_buf()),
            },
            Arc::new(MockBackend::new()),
        );

        let (_, events) = collect(
            &pipeline,
            &TranscriptionRequest::new(&input, dir.path().join("out")),
            &CancellationToken::new(),
        );
        assert_eq!(
            &events[..2],
            &[
                PipelineEvent::Log("Input: talk.mp4".to_string()),
                PipelineEvent::Log("Extracting audio with ffmpeg…".to_string()),
            ]
        );
    }

    #[test]
    fn test_persist_audio_moves_file() {
        let dir = TempDir::new().unwrap();
        let from = dir.path().join("scratch.wav");
        let to = dir.path().join("kept.wav");
        fs::write(&from, b"RIFF").unwrap();

        persist_audio(&from, &to).unwrap();
        assert_eq!(fs::read(&to).unwrap(), b"RIFF");
        assert!(!from.exists());
    }

    #[test]
    fn test_persist_audio_missing_source_is_write_failed() {
        let dir = TempDir::new().unwrap();
        let to = dir.path().join("kept.wav");
        match persist_audio(&dir.path().join("absent.wav"), &to) {
            Err(ScribeError::WriteFailed { path, .. }) => assert_eq!(path, to.display().to_string()),
            other => panic!("expected WriteFailed, got {:?}", other),
        }
        assert!(!to.exists());
    }

    #[test]
    fn test_mark_failed_sets_terminal_state() {
        let scratch = TempDir::new().unwrap();
        let pipeline = pipeline_with(MockBackend::new(), &scratch);
        pipeline.mark_failed();
        assert_eq!(pipeline.state(), PipelineState::Failed);
    }
}
