//! System diagnostics and dependency checking.
//!
//! Verifies that the decoder and model files a transcription needs are in place.

use crate::audio::extract::AudioExtractor;
use crate::config::Config;
use crate::defaults;
use crate::models;
use std::path::Path;
use std::process::Command;

/// Result of a dependency check.
#[derive(Debug, PartialEq)]
pub enum CheckResult {
    /// Tool is installed and working
    Ok,
    /// Tool is not found
    NotFound,
    /// Tool is found but has issues
    Warning(String),
}

/// Check if a command exists and answers a version query.
fn check_command(command: &Path, version_flag: &str) -> CheckResult {
    match Command::new(command).arg(version_flag).output() {
        Ok(output) if output.status.success() => CheckResult::Ok,
        Ok(_) => CheckResult::Warning(format!(
            "'{}' found but {} failed",
            command.display(),
            version_flag
        )),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => CheckResult::NotFound,
        Err(e) => CheckResult::Warning(format!("Error checking '{}': {}", command.display(), e)),
    }
}

/// Locate the configured decoder and make sure it runs.
fn check_decoder(config: &Config) -> (CheckResult, Option<String>) {
    let extractor = AudioExtractor::new(config.pipeline_config().extractor);
    match extractor.locate_decoder() {
        Ok(path) => (
            check_command(&path, "-version"),
            Some(path.display().to_string()),
        ),
        Err(e) => (CheckResult::Warning(e.to_string()), None),
    }
}

/// Run all dependency checks and print results.
///
/// Returns true when a transcription with the current configuration can start.
pub fn check_dependencies(config: &Config) -> bool {
    println!("mediascribe {}", crate::version_string());
    println!("Checking system dependencies...\n");

    print!("ffmpeg (audio extraction): ");
    let decoder_ok = match check_decoder(config) {
        (CheckResult::Ok, Some(path)) => {
            println!("✓ OK ({})", path);
            true
        }
        (CheckResult::Ok, None) => {
            println!("✓ OK");
            true
        }
        (CheckResult::NotFound, _) => {
            println!("✗ NOT FOUND");
            false
        }
        (CheckResult::Warning(msg), _) => {
            println!("✗ NOT USABLE");
            for line in msg.lines() {
                println!("  {}", line);
            }
            false
        }
    };

    println!();
    let models_dir = config.models.dir_or_default();
    println!("Models directory: {}", models_dir.display());
    let installed = models::list_installed_models(&models_dir);
    if installed.is_empty() {
        println!("  - no ggml-*.bin models installed");
    } else {
        for name in &installed {
            println!("  • {}", name);
        }
    }

    let model = &config.transcription.model;
    print!("Configured model '{}': ", model);
    let compute_type = config
        .transcription
        .compute_type
        .as_deref()
        .unwrap_or("float16");
    let model_ok = match models::resolve_model_path(&models_dir, model, compute_type) {
        Ok(path) => {
            println!("✓ {}", path.display());
            true
        }
        Err(_) => {
            println!("✗ NOT FOUND");
            println!(
                "  Download ggml-{}.bin from https://huggingface.co/ggerganov/whisper.cpp",
                models::resolve::resolve_name(model)
            );
            println!("  into {}", models_dir.display());
            false
        }
    };

    println!();
    println!("GPU acceleration:");
    let compiled = defaults::gpu_backend();
    println!("  Compiled backend: {}", compiled);
    check_gpu_nvidia(compiled);
    check_gpu_metal(compiled);

    println!();
    let ready = decoder_ok && model_ok;
    if ready {
        println!("✓ Ready to transcribe.");
    } else {
        println!("⚠ Fix the items marked ✗ before transcribing.");
    }
    ready
}

/// Check for NVIDIA GPU via `nvidia-smi`.
fn check_gpu_nvidia(compiled: &str) {
    print!("  NVIDIA (CUDA):   ");
    match Command::new("nvidia-smi")
        .arg("--query-gpu=gpu_name")
        .arg("--format=csv,noheader")
        .output()
    {
        Ok(output) if output.status.success() => {
            let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if compiled == "CUDA" {
                println!("✓ Active ({})", name);
            } else {
                println!(
                    "✓ {} found → rebuild with: cargo build --release --features cuda",
                    name
                );
            }
        }
        _ => println!("- nvidia-smi not found"),
    }
}

/// Report Metal availability (Apple platforms only).
fn check_gpu_metal(compiled: &str) {
    print!("  Apple (Metal):   ");
    if !cfg!(target_os = "macos") {
        println!("- not an Apple platform");
    } else if compiled == "Metal" {
        println!("✓ Active");
    } else {
        println!("✓ available → rebuild with: cargo build --release --features metal");
    }
}
