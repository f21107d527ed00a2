//! Speech recognition: backend seam, whisper.cpp implementation and the
//! adapter that resolves devices and normalizes segments.

pub mod backend;
pub mod recognize;
pub mod types;
pub mod whisper;

pub use backend::{MockBackend, RawTranscription, RecognitionBackend, RecognitionModel};
pub use recognize::{RecognitionParams, recognize};
pub use types::{DecodeOptions, Device, RawRunInfo, RawSegment, RecognitionRun, TimedSegment};
pub use whisper::WhisperBackend;
