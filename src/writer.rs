//! Output writer: structured JSON record and flattened timestamp text.

use crate::error::{Result, ScribeError};
use crate::stt::types::{RecognitionRun, TimedSegment};
use serde::Serialize;
use std::fs;
use std::path::Path;

#[derive(Serialize)]
struct SegmentsRecord<'a> {
    info: &'a RecognitionRun,
    segments: &'a [TimedSegment],
}

/// Format seconds as `HH:MM:SS.mmm`.
///
/// Negative and NaN input clamp to zero. Hours are at least two digits and
/// grow past 99 rather than wrapping.
pub fn format_timestamp(seconds: f64) -> String {
    let seconds = if seconds.is_nan() { 0.0 } else { seconds.max(0.0) };
    let total_ms = (seconds * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, secs, millis)
}

/// Render the flattened transcript: one line per segment with text.
pub fn render_timestamps(segments: &[TimedSegment]) -> String {
    segments
        .iter()
        .filter(|s| !s.text.is_empty())
        .map(|s| {
            format!(
                "[{} --> {}] {}\n",
                format_timestamp(s.start),
                format_timestamp(s.end),
                s.text
            )
        })
        .collect()
}

/// Render the structured record as pretty JSON with a trailing newline.
pub fn render_segments_json(
    segments: &[TimedSegment],
    run: &RecognitionRun,
) -> serde_json::Result<String> {
    let mut json = serde_json::to_string_pretty(&SegmentsRecord {
        info: run,
        segments,
    })?;
    json.push('\n');
    Ok(json)
}

/// Write both output files. Either both are written or an error is returned.
pub fn write_outputs(
    segments: &[TimedSegment],
    run: &RecognitionRun,
    segments_json_path: &Path,
    timestamps_txt_path: &Path,
) -> Result<()> {
    let json = render_segments_json(segments, run).map_err(|e| ScribeError::WriteFailed {
        path: segments_json_path.display().to_string(),
        message: e.to_string(),
    })?;
    write_file(segments_json_path, &json)?;
    write_file(timestamps_txt_path, &render_timestamps(segments))?;

    tracing::debug!(
        json = %segments_json_path.display(),
        txt = %timestamps_txt_path.display(),
        segments = segments.len(),
        "outputs written"
    );
    Ok(())
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).map_err(|e| ScribeError::WriteFailed {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stt::types::Device;
    use tempfile::TempDir;

    fn segment(start: f64, end: f64, text: &str) -> TimedSegment {
        TimedSegment {
            start,
            end,
            text: text.to_string(),
            avg_logprob: None,
            no_speech_prob: None,
            compression_ratio: None,
        }
    }

    fn run() -> RecognitionRun {
        RecognitionRun {
            language: "en".to_string(),
            language_probability: Some(1.0),
            duration: 3.0,
            duration_after_vad: 2.5,
            model_name: "small".to_string(),
            device: Device::Cpu,
            compute_type: "int8".to_string(),
            beam_size: 5,
            vad_filter: true,
        }
    }

    #[test]
    fn test_format_timestamp_zero() {
        assert_eq!(format_timestamp(0.0), "00:00:00.000");
    }

    #[test]
    fn test_format_timestamp_negative_and_nan_clamp() {
        assert_eq!(format_timestamp(-5.0), "00:00:00.000");
        assert_eq!(format_timestamp(f64::NAN), "00:00:00.000");
    }

    #[test]
    fn test_format_timestamp_rounds_half_away_from_zero() {
        assert_eq!(format_timestamp(3661.2005), "01:01:01.201");
        assert_eq!(format_timestamp(1.5), "00:00:01.500");
        assert_eq!(format_timestamp(59.9996), "00:01:00.000");
    }

    #[test]
    fn test_format_timestamp_hours_unbounded() {
        assert_eq!(format_timestamp(360_000.0), "100:00:00.000");
    }

    #[test]
    fn test_format_timestamp_monotonic() {
        let mut previous = format_timestamp(0.0);
        for i in 1..5000 {
            let current = format_timestamp(i as f64 * 0.0137);
            assert!(current >= previous, "{current} < {previous}");
            previous = current;
        }
    }

    #[test]
    fn test_render_timestamps_skips_empty_text() {
        let segments = vec![
            segment(0.0, 1.5, "Hello"),
            segment(1.5, 2.0, ""),
            segment(2.0, 3.25, "world"),
        ];
        assert_eq!(
            render_timestamps(&segments),
            "[00:00:00.000 --> 00:00:01.500] Hello\n[00:00:02.000 --> 00:00:03.250] world\n"
        );
    }

    #[test]
    fn test_render_timestamps_empty() {
        assert_eq!(render_timestamps(&[]), "");
        assert_eq!(render_timestamps(&[segment(0.0, 1.0, "")]), "");
    }

    #[test]
    fn test_segments_json_layout() {
        let mut with_diag = segment(0.0, 1.0, "Hi");
        with_diag.avg_logprob = Some(-0.5);
        let json = render_segments_json(&[with_diag, segment(1.0, 2.0, "")], &run()).unwrap();
        assert!(json.ends_with("}\n"));
        assert!(json.contains("\n  \"info\": {"));

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["info"]["model_name"], "small");
        assert_eq!(value["info"]["device"], "cpu");
        assert_eq!(value["info"]["beam_size"], 5);
        let segments = value["segments"].as_array().unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0]["avg_logprob"], -0.5);
        assert!(segments[0]["no_speech_prob"].is_null());
        assert!(segments[1]["compression_ratio"].is_null());
        assert_eq!(segments[1]["text"], "");
    }

    #[test]
    fn test_write_outputs_counts() {
        let dir = TempDir::new().unwrap();
        let json_path = dir.path().join("a.segments.json");
        let txt_path = dir.path().join("a.timestamps.txt");
        let segments = vec![
            segment(0.0, 1.0, "one"),
            segment(1.0, 2.0, ""),
            segment(2.0, 3.0, "three"),
        ];
        write_outputs(&segments, &run(), &json_path, &txt_path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(value["segments"].as_array().unwrap().len(), 3);
        assert_eq!(fs::read_to_string(&txt_path).unwrap().lines().count(), 2);
    }

    #[test]
    fn test_write_outputs_idempotent() {
        let dir = TempDir::new().unwrap();
        let json_path = dir.path().join("a.segments.json");
        let txt_path = dir.path().join("a.timestamps.txt");
        let segments = vec![segment(0.25, 1.75, "same")];

        write_outputs(&segments, &run(), &json_path, &txt_path).unwrap();
        let first = (fs::read(&json_path).unwrap(), fs::read(&txt_path).unwrap());
        write_outputs(&segments, &run(), &json_path, &txt_path).unwrap();
        let second = (fs::read(&json_path).unwrap(), fs::read(&txt_path).unwrap());
        assert_eq!(first, second);
    }

    #[test]
    fn test_write_outputs_no_segments_gives_empty_text_file() {
        let dir = TempDir::new().unwrap();
        let json_path = dir.path().join("a.segments.json");
        let txt_path = dir.path().join("a.timestamps.txt");
        write_outputs(&[], &run(), &json_path, &txt_path).unwrap();
        assert_eq!(fs::read_to_string(&txt_path).unwrap(), "");
        assert!(fs::read_to_string(&json_path).unwrap().contains("\"segments\": []"));
    }

    #[test]
    fn test_write_outputs_reports_path_on_failure() {
        let dir = TempDir::new().unwrap();
        let json_path = dir.path().join("missing").join("a.segments.json");
        let txt_path = dir.path().join("a.timestamps.txt");
        match write_outputs(&[], &run(), &json_path, &txt_path) {
            Err(ScribeError::WriteFailed { path, .. }) => {
                assert_eq!(path, json_path.display().to_string());
            }
            other => panic!("expected WriteFailed, got {:?}", other),
        }
        assert!(!txt_path.exists());
    }
}
