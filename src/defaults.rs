//! Default configuration constants for mediascribe.
//!
//! Shared by the config file, the CLI and the pipeline so every entry point
//! agrees on the same defaults.

use std::time::Duration;

/// Sample rate of the extracted audio in Hz.
///
/// Whisper models are trained on 16kHz input; anything else must be resampled.
pub const SAMPLE_RATE: u32 = 16000;

/// Channel count of the extracted audio.
pub const CHANNELS: u16 = 1;

/// Default Whisper model name.
pub const DEFAULT_MODEL: &str = "small";

/// Default language code for transcription.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Language value that triggers automatic language detection.
pub const AUTO_LANGUAGE: &str = "auto";

/// Default beam width for decoding.
pub const DEFAULT_BEAM_SIZE: u32 = 5;

/// RMS threshold above which an analysis frame counts as speech.
///
/// Extracted file audio is quieter than close-talk microphone input, hence
/// lower than a live-capture threshold would be.
pub const VAD_THRESHOLD: f32 = 0.01;

/// Silence shorter than this does not split a speech region.
pub const VAD_MIN_SILENCE_MS: u32 = 2000;

/// Default output directory, relative to the working directory.
pub const DEFAULT_OUTPUT_DIR: &str = "output";

/// Name of the decoder executable looked up on `PATH`.
pub const DECODER_BINARY: &str = "ffmpeg";

/// How often the extraction runner checks the decoder and the cancellation token.
pub const DECODER_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Time a cancelled decoder gets to exit after a graceful termination request.
pub const DECODER_GRACE_PERIOD: Duration = Duration::from_secs(2);

/// How often a presentation loop drains the worker's event queue.
pub const UI_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Prefix of per-invocation scratch directories.
pub const SCRATCH_PREFIX: &str = "mediascribe-";

/// Report the GPU backend compiled into this build.
///
/// Returns a human-readable name based on the compile-time feature flags.
pub fn gpu_backend() -> &'static str {
    if cfg!(feature = "cuda") {
        "CUDA"
    } else if cfg!(feature = "metal") {
        "Metal"
    } else {
        "CPU"
    }
}
