//! Audio extraction via an external ffmpeg process.
//!
//! The decoder is spawned, polled at a fixed interval and, on cancellation,
//! shut down in two phases: SIGTERM, a grace period, then a forced kill.
//! Failures of that shutdown are logged and swallowed so the cancellation
//! path itself can never error out or hang the caller.

use crate::cancel::CancellationToken;
use crate::defaults;
use crate::error::{Result, ScribeError};
use crate::sys;
use std::ffi::OsString;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const INSTALL_HINT: &str = "Install ffmpeg and make sure it is on PATH \
    (macOS: `brew install ffmpeg`, Windows: `winget install Gyan.FFmpeg` or `choco install ffmpeg`, \
    Linux: `sudo apt-get install ffmpeg`), or set `decoder.path` in the config file.";

/// Configuration for the extraction runner.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Decoder executable (path or bare name). `None` searches `PATH` for ffmpeg.
    pub decoder: Option<PathBuf>,
    /// Interval between liveness/cancellation checks.
    pub poll_interval: Duration,
    /// Time allowed between the graceful termination request and the forced kill.
    pub grace_period: Duration,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            decoder: None,
            poll_interval: defaults::DECODER_POLL_INTERVAL,
            grace_period: defaults::DECODER_GRACE_PERIOD,
        }
    }
}

/// Runs ffmpeg to produce a PCM WAV file suitable for speech recognition.
#[derive(Debug, Clone, Default)]
pub struct AudioExtractor {
    config: ExtractorConfig,
}

impl AudioExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Resolve the decoder executable.
    ///
    /// # Errors
    /// Returns `ScribeError::DecoderNotFound` if neither the configured path
    /// nor a `PATH` lookup yields an executable.
    pub fn locate_decoder(&self) -> Result<PathBuf> {
        let wanted = self
            .config
            .decoder
            .clone()
            .unwrap_or_else(|| PathBuf::from(defaults::DECODER_BINARY));

        if wanted.components().count() > 1 && wanted.is_file() {
            return Ok(wanted);
        }

        which::which(&wanted).map_err(|_| ScribeError::DecoderNotFound {
            decoder: wanted.display().to_string(),
            hint: INSTALL_HINT.to_string(),
        })
    }

    /// Extract the audio track of `input` into `output` as 16-bit PCM WAV.
    ///
    /// Overwrites `output` if present and creates its parent directory.
    ///
    /// # Errors
    /// - `DecoderNotFound` if ffmpeg cannot be located
    /// - `DecoderFailed` if ffmpeg exits non-zero
    /// - `Cancelled` if `token` is set before ffmpeg finishes
    pub fn extract(
        &self,
        input: &Path,
        output: &Path,
        sample_rate_hz: u32,
        channels: u16,
        token: &CancellationToken,
    ) -> Result<()> {
        let decoder = self.locate_decoder()?;

        if let Some(parent) = output.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        token.check()?;

        let args = decoder_args(input, output, sample_rate_hz, channels);
        let command_line = render_command(&decoder, &args);
        tracing::debug!(command = %command_line, "spawning decoder");

        let mut command = Command::new(&decoder);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        // Keep terminal Ctrl+C away from the decoder; the host cancels it itself.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let mut child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ScribeError::DecoderNotFound {
                    decoder: decoder.display().to_string(),
                    hint: INSTALL_HINT.to_string(),
                }
            } else {
                ScribeError::Io(e)
            }
        })?;

        let stderr_reader = spawn_stderr_reader(&mut child);

        let status = match self.wait_or_cancel(&mut child, token) {
            Ok(status) => status,
            Err(e) => {
                // The reader is detached: a decoder that survived the kill must not block us.
                drop(stderr_reader);
                return Err(e);
            }
        };

        let stderr = collect_stderr(stderr_reader);

        if status.success() {
            tracing::debug!(output = %output.display(), "decoder finished");
            return Ok(());
        }

        // A decoder that died because of our own shutdown is a cancellation, not a failure.
        if token.is_cancelled() {
            return Err(ScribeError::Cancelled);
        }

        Err(ScribeError::DecoderFailed {
            exit_code: status.code(),
            command: command_line,
            stderr,
        })
    }

    fn wait_or_cancel(&self, child: &mut Child, token: &CancellationToken) -> Result<ExitStatus> {
        loop {
            if token.is_cancelled() {
                terminate(child, self.config.grace_period, self.config.poll_interval);
                return Err(ScribeError::Cancelled);
            }

            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) => thread::sleep(self.config.poll_interval),
                Err(e) => {
                    terminate(child, self.config.grace_period, self.config.poll_interval);
                    return Err(ScribeError::Io(e));
                }
            }
        }
    }
}

/// Build the ffmpeg argument list (without the executable).
pub fn decoder_args(
    input: &Path,
    output: &Path,
    sample_rate_hz: u32,
    channels: u16,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-hide_banner", "-nostdin", "-loglevel", "error", "-y", "-i"]
        .iter()
        .map(OsString::from)
        .collect();
    args.push(input.as_os_str().to_owned());
    args.push("-vn".into());
    args.push("-ac".into());
    args.push(channels.to_string().into());
    args.push("-ar".into());
    args.push(sample_rate_hz.to_string().into());
    args.push("-c:a".into());
    args.push("pcm_s16le".into());
    args.push(output.as_os_str().to_owned());
    args
}

fn render_command(decoder: &Path, args: &[OsString]) -> String {
    std::iter::once(decoder.as_os_str())
        .chain(args.iter().map(OsString::as_os_str))
        .map(|part| part.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

fn spawn_stderr_reader(child: &mut Child) -> Option<JoinHandle<Vec<u8>>> {
    let mut pipe = child.stderr.take()?;
    let spawned = thread::Builder::new()
        .name("decoder-stderr".to_string())
        .spawn(move || {
            let mut buf = Vec::new();
            if let Err(e) = pipe.read_to_end(&mut buf) {
                tracing::debug!(error = %e, "reading decoder stderr failed");
            }
            buf
        });
    match spawned {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "could not spawn decoder stderr reader");
            None
        }
    }
}

fn collect_stderr(reader: Option<JoinHandle<Vec<u8>>>) -> String {
    match reader.map(JoinHandle::join) {
        Some(Ok(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
        Some(Err(_)) => {
            tracing::warn!("decoder stderr reader panicked");
            String::new()
        }
        None => String::new(),
    }
}

/// Two-phase shutdown: graceful request, bounded wait, forced kill.
///
/// Never fails; problems are logged.
fn terminate(child: &mut Child, grace: Duration, poll: Duration) {
    let pid = child.id();

    match sys::request_termination(pid) {
        Ok(()) => {
            let deadline = Instant::now() + grace;
            loop {
                match child.try_wait() {
                    Ok(Some(status)) => {
                        tracing::debug!(pid, %status, "decoder exited after termination request");
                        return;
                    }
                    Ok(None) => {
                        let now = Instant::now();
                        if now >= deadline {
                            break;
                        }
                        thread::sleep(poll.min(deadline - now));
                    }
                    Err(e) => {
                        tracing::warn!(pid, error = %e, "waiting for decoder failed");
                        break;
                    }
                }
            }
            tracing::warn!(pid, ?grace, "decoder ignored termination request, killing");
        }
        Err(e) if e.kind() == std::io::ErrorKind::Unsupported => {}
        Err(e) => tracing::warn!(pid, error = %e, "termination request failed"),
    }

    match child.kill() {
        Ok(()) => {
            if let Err(e) = child.wait() {
                tracing::warn!(pid, error = %e, "reaping killed decoder failed");
            }
        }
        Err(e) => tracing::warn!(pid, error = %e, "killing decoder failed"),
    }
}
