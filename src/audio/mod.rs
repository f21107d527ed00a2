//! Audio extraction and loading.

pub mod extract;
pub mod vad;
pub mod wav;

pub use extract::{AudioExtractor, ExtractorConfig};
pub use wav::PcmAudio;
