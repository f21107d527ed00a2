//! Command-line interface for mediascribe
//!
//! Provides argument parsing using clap derive macros.

use crate::config::Config;
use crate::pipeline::types::TranscriptionRequest;
use crate::stt::types::Device;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Local media → timestamped text transcriber (offline)
#[derive(Parser, Debug)]
#[command(
    name = "mediascribe",
    version,
    about = "Local media → timestamped text transcriber (offline)",
    subcommand_negates_reqs = true
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress progress output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose diagnostics (-v: info, -vv: debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Input media file (any ffmpeg-supported video/audio), e.g. .mp4 .mov .mkv .mp3 .m4a
    #[arg(long, short, required = true, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Output directory (default: ./output)
    #[arg(long, value_name = "DIR")]
    pub outdir: Option<PathBuf>,

    /// Whisper model name or path to a ggml model file (default: small)
    #[arg(long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Language code (default: en). Use "auto" to detect
    #[arg(long, value_name = "LANG")]
    pub language: Option<String>,

    /// Device: auto, cpu, gpu-cuda (cuda), gpu-metal (metal) (default: auto)
    #[arg(long, value_name = "DEVICE")]
    pub device: Option<Device>,

    /// Compute type (e.g. int8, float16). If omitted, picked based on device
    #[arg(long, value_name = "TYPE")]
    pub compute_type: Option<String>,

    /// Beam size (default: 5)
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub beam_size: Option<u32>,

    /// Enable the voice activity filter
    #[arg(long, overrides_with = "no_vad")]
    pub vad: bool,

    /// Disable the voice activity filter
    #[arg(long, overrides_with = "vad")]
    pub no_vad: bool,

    /// Keep the extracted wav next to the outputs
    #[arg(long, overrides_with = "no_keep_wav")]
    pub keep_wav: bool,

    /// Discard the extracted wav even if the config keeps it
    #[arg(long, overrides_with = "keep_wav")]
    pub no_keep_wav: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check ffmpeg, model directory and GPU support
    Check,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

impl Cli {
    /// Build the run request, with flags taking precedence over `config`.
    ///
    /// Returns `None` when no input was given (subcommand invocations).
    pub fn to_request(&self, config: &Config) -> Option<TranscriptionRequest> {
        let input = self.input.clone()?;
        let defaults = &config.transcription;
        let output_dir = self
            .outdir
            .clone()
            .unwrap_or_else(|| defaults.output_dir.clone());

        let mut request = TranscriptionRequest::new(input, output_dir);
        request.model = self.model.clone().unwrap_or_else(|| defaults.model.clone());
        request.language = self
            .language
            .clone()
            .unwrap_or_else(|| defaults.language.clone());
        request.device = self.device.unwrap_or(defaults.device);
        request.compute_type = self
            .compute_type
            .clone()
            .or_else(|| defaults.compute_type.clone());
        request.beam_size = self.beam_size.unwrap_or(defaults.beam_size);
        request.vad_filter = switch(self.vad, self.no_vad, defaults.vad_filter);
        request.keep_audio = switch(self.keep_wav, self.no_keep_wav, defaults.keep_audio);
        Some(request)
    }
}

/// Resolve an on/off flag pair against the configured value.
///
/// Clap leaves at most one of the pair set (the last one given).
fn switch(on: bool, off: bool, configured: bool) -> bool {
    if on {
        true
    } else if off {
        false
    } else {
        configured
    }
}
