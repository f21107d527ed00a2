use crate::cancel::CancellationToken;
use crate::error::{Result, ScribeError};
use crate::stt::types::{DecodeOptions, Device, RawRunInfo, RawSegment};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Lazily produced segments, in emission order.
pub type SegmentStream = Box<dyn Iterator<Item = Result<RawSegment>> + Send>;

/// Result of a backend decoding call.
pub struct RawTranscription {
    pub info: RawRunInfo,
    pub segments: SegmentStream,
}

impl std::fmt::Debug for RawTranscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawTranscription")
            .field("info", &self.info)
            .field("segments", &"<stream>")
            .finish()
    }
}

/// Trait for speech recognition engines.
///
/// This trait allows swapping implementations (real Whisper vs mock).
pub trait RecognitionBackend: Send + Sync {
    /// Short engine name for logs.
    fn name(&self) -> &str;

    /// Load `model` on exactly `device` with the given precision.
    ///
    /// `device` is never `Device::Auto`; resolution happens in the adapter.
    fn load(
        &self,
        model: &str,
        device: Device,
        compute_type: &str,
    ) -> Result<Box<dyn RecognitionModel>>;
}

/// A model loaded on a concrete device.
pub trait RecognitionModel: Send {
    /// Decode the WAV file at `audio_path`. Not interruptible.
    fn transcribe(&self, audio_path: &Path, options: &DecodeOptions) -> Result<RawTranscription>;
}

/// Implement RecognitionBackend for Arc<T> to allow sharing across runs.
impl<T: RecognitionBackend + ?Sized> RecognitionBackend for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn load(
        &self,
        model: &str,
        device: Device,
        compute_type: &str,
    ) -> Result<Box<dyn RecognitionModel>> {
        (**self).load(model, device, compute_type)
    }
}

#[derive(Debug, Default)]
struct MockLog {
    loads: Vec<(Device, String)>,
    transcribed: Vec<PathBuf>,
}

/// Mock backend for testing
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    info: RawRunInfo,
    segments: Vec<RawSegment>,
    failing_devices: Vec<Device>,
    fail_transcribe: bool,
    cancel_during_transcribe: Option<CancellationToken>,
    log: Arc<Mutex<MockLog>>,
}

impl MockBackend {
    /// Create a mock that returns no segments
    pub fn new() -> Self {
        Self {
            info: RawRunInfo {
                language: "en".to_string(),
                language_probability: Some(1.0),
                duration: 0.0,
                duration_after_vad: 0.0,
            },
            ..Default::default()
        }
    }

    /// Configure the segments returned by transcribe
    pub fn with_segments(mut self, segments: Vec<RawSegment>) -> Self {
        self.segments = segments;
        self
    }

    /// Configure the run metadata returned by transcribe
    pub fn with_info(mut self, info: RawRunInfo) -> Self {
        self.info = info;
        self
    }

    /// Make `load` fail on `device`
    pub fn with_failing_device(mut self, device: Device) -> Self {
        self.failing_devices.push(device);
        self
    }

    /// Make transcribe fail
    pub fn with_transcribe_failure(mut self) -> Self {
        self.fail_transcribe = true;
        self
    }

    /// Set `token` while "decoding", like a user pressing stop mid-recognition
    pub fn with_cancel_during_transcribe(mut self, token: CancellationToken) -> Self {
        self.cancel_during_transcribe = Some(token);
        self
    }

    /// Every (device, compute type) pair `load` was called with, in order
    pub fn load_attempts(&self) -> Vec<(Device, String)> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .loads
            .clone()
    }

    /// Every audio path transcribe was called with, in order
    pub fn transcribed_paths(&self) -> Vec<PathBuf> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .transcribed
            .clone()
    }
}

impl RecognitionBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn load(
        &self,
        _model: &str,
        device: Device,
        compute_type: &str,
    ) -> Result<Box<dyn RecognitionModel>> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .loads
            .push((device, compute_type.to_string()));

        if self.failing_devices.contains(&device) {
            return Err(ScribeError::BackendInitFailed {
                message: format!("mock device {} unavailable", device),
            });
        }
        Ok(Box::new(self.clone()))
    }
}

impl RecognitionModel for MockBackend {
    fn transcribe(&self, audio_path: &Path, _options: &DecodeOptions) -> Result<RawTranscription> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .transcribed
            .push(audio_path.to_path_buf());

        if let Some(token) = &self.cancel_during_transcribe {
            token.cancel();
        }
        if self.fail_transcribe {
            return Err(ScribeError::RecognitionFailed {
                message: "mock recognition failure".to_string(),
            });
        }
        Ok(RawTranscription {
            info: self.info.clone(),
            segments: Box::new(
                self.segments
                    .clone()
                    .into_iter()
                    .map(Ok::<RawSegment, ScribeError>),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> DecodeOptions {
        DecodeOptions {
            language: "en".to_string(),
            beam_size: 5,
            vad_filter: true,
        }
    }

    #[test]
    fn test_mock_returns_segments_in_order() {
        let backend = MockBackend::new().with_segments(vec![
            RawSegment::new(0.0, 1.0, "one"),
            RawSegment::new(1.0, 2.0, "two"),
        ]);
        let model = backend.load("small", Device::Cpu, "int8").unwrap();
        let result = model.transcribe(Path::new("a.wav"), &options()).unwrap();
        let texts: Vec<String> = result.segments.map(|s| s.unwrap().text).collect();
        assert_eq!(texts, vec!["one", "two"]);
        assert_eq!(result.info.language, "en");
    }

    #[test]
    fn test_mock_failing_device() {
        let backend = MockBackend::new().with_failing_device(Device::Cuda);
        assert!(matches!(
            backend.load("small", Device::Cuda, "float16"),
            Err(ScribeError::BackendInitFailed { .. })
        ));
        assert!(backend.load("small", Device::Cpu, "int8").is_ok());
        assert_eq!(
            backend.load_attempts(),
            vec![
                (Device::Cuda, "float16".to_string()),
                (Device::Cpu, "int8".to_string())
            ]
        );
    }

    #[test]
    fn test_mock_transcribe_failure() {
        let backend = MockBackend::new().with_transcribe_failure();
        let model = backend.load("small", Device::Cpu, "int8").unwrap();
        assert!(matches!(
            model.transcribe(Path::new("a.wav"), &options()),
            Err(ScribeError::RecognitionFailed { .. })
        ));
        assert_eq!(backend.transcribed_paths(), vec![PathBuf::from("a.wav")]);
    }

    #[test]
    fn test_backend_trait_is_object_safe() {
        let backend: Arc<dyn RecognitionBackend> = Arc::new(MockBackend::new());
        assert_eq!(backend.name(), "mock");
        assert!(backend.load("small", Device::Cpu, "int8").is_ok());
    }
}
