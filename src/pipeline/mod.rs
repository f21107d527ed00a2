//! Transcription pipeline: request → extraction → recognition → output files.
//!
//! `Pipeline` runs one invocation synchronously; `TranscriptionWorker` moves it
//! onto a background thread for interactive front ends.

pub mod orchestrator;
pub mod types;
pub mod worker;

pub use orchestrator::{Pipeline, PipelineConfig};
pub use types::{PipelineEvent, PipelineState, TranscriptionOutputs, TranscriptionRequest};
pub use worker::{StartOutcome, TranscriptionWorker};
