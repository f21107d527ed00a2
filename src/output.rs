//! Terminal rendering of pipeline events.
//!
//! Progress lines go to stderr; the list of written files goes to stdout so it
//! can be piped.

use crate::pipeline::types::{PipelineEvent, PipelineState, TranscriptionOutputs};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use std::io::IsTerminal;
use std::time::Duration;

const SPINNER_TICK: Duration = Duration::from_millis(120);

/// Render a progress line.
pub fn format_log(message: &str, color: bool) -> String {
    if color && message.ends_with('…') {
        message.dimmed().to_string()
    } else {
        message.to_string()
    }
}

/// Render the stderr summary line for a terminal event.
///
/// Returns `None` for `Log` events.
pub fn format_terminal(event: &PipelineEvent, color: bool) -> Option<String> {
    let text = match event {
        PipelineEvent::Log(_) => return None,
        PipelineEvent::Completed(outputs) => {
            format!("Outputs saved to: {}", outputs.output_dir.display())
        }
        PipelineEvent::Cancelled => "Cancelled.".to_string(),
        PipelineEvent::Failed(message) => format!("Error: {}", message),
    };
    if !color {
        return Some(text);
    }
    Some(match event {
        PipelineEvent::Completed(_) => text.green().to_string(),
        PipelineEvent::Cancelled => text.yellow().to_string(),
        _ => text.red().to_string(),
    })
}

/// Paths written by a completed run, one per line.
pub fn format_outputs(outputs: &TranscriptionOutputs) -> Vec<String> {
    std::iter::once(&outputs.segments_json_path)
        .chain(std::iter::once(&outputs.timestamps_txt_path))
        .chain(outputs.audio_path.as_ref())
        .map(|p| p.display().to_string())
        .collect()
}

/// Spinner message for a pipeline stage.
fn stage_message(state: PipelineState) -> &'static str {
    match state {
        PipelineState::Initializing => "Starting",
        PipelineState::Extracting => "Extracting audio",
        PipelineState::Transcribing => "Transcribing",
        PipelineState::WritingOutputs => "Writing outputs",
        PipelineState::Completed | PipelineState::Cancelled | PipelineState::Failed => "",
    }
}

/// Renders the event stream of one run to the terminal.
pub struct EventRenderer {
    quiet: bool,
    color: bool,
    spinner: Option<ProgressBar>,
}

impl EventRenderer {
    /// Spinner and colors only when stderr is a terminal and not quiet.
    pub fn new(quiet: bool) -> Self {
        let interactive = std::io::stderr().is_terminal();
        let spinner = (interactive && !quiet).then(|| {
            let style = ProgressStyle::with_template("{spinner:.green} {msg} {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            let pb = ProgressBar::new_spinner().with_style(style);
            pb.enable_steady_tick(SPINNER_TICK);
            pb
        });
        Self {
            quiet,
            color: interactive,
            spinner,
        }
    }

    /// Update the spinner to reflect the current stage.
    pub fn set_stage(&self, state: PipelineState) {
        if let Some(pb) = &self.spinner {
            pb.set_message(stage_message(state));
        }
    }

    pub fn render(&mut self, event: &PipelineEvent) {
        match event {
            PipelineEvent::Log(message) => {
                if self.quiet {
                    return;
                }
                let line = format_log(message, self.color);
                match &self.spinner {
                    Some(pb) => pb.println(line),
                    None => eprintln!("{}", line),
                }
            }
            terminal => {
                if let Some(pb) = self.spinner.take() {
                    pb.finish_and_clear();
                }
                let show_summary = !self.quiet || !matches!(terminal, PipelineEvent::Completed(_));
                if show_summary && let Some(line) = format_terminal(terminal, self.color) {
                    eprintln!("{}", line);
                }
                if let PipelineEvent::Completed(outputs) = terminal {
                    for path in format_outputs(outputs) {
                        println!("{}", path);
                    }
                }
            }
        }
    }
}

impl Drop for EventRenderer {
    fn drop(&mut self) {
        if let Some(pb) = self.spinner.take() {
            pb.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn outputs(with_audio: bool) -> TranscriptionOutputs {
        TranscriptionOutputs {
            base_name: "talk".to_string(),
            output_dir: PathBuf::from("/out"),
            segments_json_path: PathBuf::from("/out/talk.segments.json"),
            timestamps_txt_path: PathBuf::from("/out/talk.timestamps.txt"),
            audio_path: with_audio.then(|| PathBuf::from("/out/talk.wav")),
        }
    }

    #[test]
    fn test_format_log_plain() {
        assert_eq!(format_log("Input: a.mp4", false), "Input: a.mp4");
        assert_eq!(format_log("Writing outputs…", false), "Writing outputs…");
    }

    #[test]
    fn test_format_log_colored_keeps_text() {
        let line = format_log("Writing outputs…", true);
        assert!(line.contains("Writing outputs…"));
        assert!(line.contains("\x1b["));
    }

    #[test]
    fn test_format_terminal_plain() {
        assert_eq!(
            format_terminal(&PipelineEvent::Completed(outputs(false)), false).as_deref(),
            Some("Outputs saved to: /out")
        );
        assert_eq!(
            format_terminal(&PipelineEvent::Cancelled, false).as_deref(),
            Some("Cancelled.")
        );
        assert_eq!(
            format_terminal(&PipelineEvent::Failed("boom".to_string()), false).as_deref(),
            Some("Error: boom")
        );
        assert!(format_terminal(&PipelineEvent::Log("x".to_string()), false).is_none());
    }

    #[test]
    fn test_format_terminal_colored_wraps_text() {
        let line = format_terminal(&PipelineEvent::Failed("boom".to_string()), true).unwrap();
        assert!(line.starts_with("\x1b["));
        assert!(line.contains("Error: boom"));
    }

    #[test]
    fn test_format_outputs_lists_written_files() {
        assert_eq!(
            format_outputs(&outputs(false)),
            vec!["/out/talk.segments.json", "/out/talk.timestamps.txt"]
        );
        assert_eq!(format_outputs(&outputs(true)).len(), 3);
        assert_eq!(format_outputs(&outputs(true))[2], "/out/talk.wav");
    }

    #[test]
    fn test_stage_messages() {
        assert_eq!(stage_message(PipelineState::Extracting), "Extracting audio");
        assert_eq!(stage_message(PipelineState::Transcribing), "Transcribing");
        assert_eq!(stage_message(PipelineState::Completed), "");
    }

    #[test]
    fn test_quiet_renderer_has_no_spinner() {
        let mut renderer = EventRenderer::new(true);
        assert!(renderer.spinner.is_none());
        renderer.render(&PipelineEvent::Log("hidden".to_string()));
        renderer.set_stage(PipelineState::Transcribing);
    }
}
