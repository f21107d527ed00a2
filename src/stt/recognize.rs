//! Recognition adapter: device resolution, decoding and segment normalization.

use crate::cancel::CancellationToken;
use crate::error::{Result, ScribeError};
use crate::stt::backend::{RecognitionBackend, RecognitionModel};
use crate::stt::types::{DecodeOptions, Device, RecognitionRun, TimedSegment};
use std::path::Path;

/// What to recognize and how.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionParams {
    pub model: String,
    pub language: String,
    pub device: Device,
    /// Explicit precision; `None` picks the device default.
    pub compute_type: Option<String>,
    pub beam_size: u32,
    pub vad_filter: bool,
}

/// A model that initialized, with the device and precision it runs on.
struct LoadedModel {
    model: Box<dyn RecognitionModel>,
    device: Device,
    compute_type: String,
}

/// Run recognition on `wav_path` and return run metadata plus all segments.
///
/// Cancellation is checked on entry, after model initialization and after
/// the decoding call; the decoding call itself cannot be interrupted.
pub fn recognize(
    backend: &dyn RecognitionBackend,
    wav_path: &Path,
    params: &RecognitionParams,
    token: &CancellationToken,
    on_log: &mut dyn FnMut(String),
) -> Result<(RecognitionRun, Vec<TimedSegment>)> {
    token.check()?;

    let loaded = load_model(backend, params, on_log)?;
    on_log(format!(
        "Model '{}' loaded on {} ({})",
        params.model, loaded.device, loaded.compute_type
    ));

    token.check()?;

    let options = DecodeOptions {
        language: params.language.clone(),
        beam_size: params.beam_size,
        vad_filter: params.vad_filter,
    };
    let raw = loaded.model.transcribe(wav_path, &options)?;

    // Drain in emission order; no re-sorting.
    let segments = raw
        .segments
        .map(|segment| segment.map(TimedSegment::from))
        .collect::<Result<Vec<_>>>()?;

    token.check()?;

    let run = RecognitionRun {
        language: raw.info.language,
        language_probability: raw.info.language_probability,
        duration: raw.info.duration,
        duration_after_vad: raw.info.duration_after_vad,
        model_name: params.model.clone(),
        device: loaded.device,
        compute_type: loaded.compute_type,
        beam_size: params.beam_size,
        vad_filter: params.vad_filter,
    };

    tracing::info!(
        backend = backend.name(),
        segments = segments.len(),
        language = %run.language,
        "recognition finished"
    );

    Ok((run, segments))
}

fn load_model(
    backend: &dyn RecognitionBackend,
    params: &RecognitionParams,
    on_log: &mut dyn FnMut(String),
) -> Result<LoadedModel> {
    let try_load = |device: Device| -> Result<LoadedModel> {
        let compute_type = params
            .compute_type
            .clone()
            .unwrap_or_else(|| device.default_compute_type().to_string());
        let model = backend.load(&params.model, device, &compute_type)?;
        Ok(LoadedModel {
            model,
            device,
            compute_type,
        })
    };

    if params.device != Device::Auto {
        return try_load(params.device);
    }

    let candidates = Device::auto_candidates();
    let mut last_error: Option<ScribeError> = None;
    for &device in candidates {
        match try_load(device) {
            Ok(loaded) => return Ok(loaded),
            Err(e) => {
                tracing::warn!(%device, error = %e, "recognition device rejected");
                on_log(format!("Device {} unavailable ({}), trying next", device, e));
                last_error = Some(e);
            }
        }
    }

    let tried = candidates
        .iter()
        .map(Device::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    Err(ScribeError::BackendInitFailed {
        message: match last_error {
            Some(e) => format!("no device could be initialized (tried {}): {}", tried, e),
            None => format!("no device could be initialized (tried {})", tried),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stt::backend::MockBackend;
    use crate::stt::types::{RawRunInfo, RawSegment};

    fn params(device: Device, compute_type: Option<&str>) -> RecognitionParams {
        RecognitionParams {
            model: "small".to_string(),
            language: "en".to_string(),
            device,
            compute_type: compute_type.map(str::to_string),
            beam_size: 5,
            vad_filter: true,
        }
    }

    fn run(
        backend: &MockBackend,
        params: &RecognitionParams,
        token: &CancellationToken,
    ) -> (Result<(RecognitionRun, Vec<TimedSegment>)>, Vec<String>) {
        let mut logs = Vec::new();
        let result = recognize(backend, Path::new("a.wav"), params, token, &mut |m| {
            logs.push(m)
        });
        (result, logs)
    }

    #[test]
    fn test_explicit_device_uses_default_precision() {
        let backend = MockBackend::new();
        let (result, _) = run(&backend, &params(Device::Cpu, None), &CancellationToken::new());
        let (info, _) = result.unwrap();
        assert_eq!(info.device, Device::Cpu);
        assert_eq!(info.compute_type, "int8");
        assert_eq!(backend.load_attempts(), vec![(Device::Cpu, "int8".to_string())]);
    }

    #[test]
    fn test_explicit_precision_never_overridden() {
        let backend = MockBackend::new();
        let (result, _) = run(
            &backend,
            &params(Device::Cuda, Some("int8_float16")),
            &CancellationToken::new(),
        );
        let (info, _) = result.unwrap();
        assert_eq!(info.compute_type, "int8_float16");
    }

    #[test]
    fn test_explicit_device_failure_propagates_without_fallback() {
        let backend = MockBackend::new().with_failing_device(Device::Cuda);
        let (result, _) = run(&backend, &params(Device::Cuda, None), &CancellationToken::new());
        match result {
            Err(ScribeError::BackendInitFailed { message }) => {
                assert_eq!(message, "mock device cuda unavailable");
            }
            other => panic!("expected BackendInitFailed, got {:?}", other.map(|_| ())),
        }
        assert_eq!(backend.load_attempts().len(), 1);
    }

    #[test]
    fn test_auto_prefers_gpu() {
        let backend = MockBackend::new();
        let (result, logs) = run(&backend, &params(Device::Auto, None), &CancellationToken::new());
        let (info, _) = result.unwrap();
        assert_eq!(info.device, Device::auto_candidates()[0]);
        assert_eq!(info.compute_type, "float16");
        assert!(logs.iter().all(|l| !l.contains("unavailable")));
    }

    #[test]
    fn test_auto_falls_back_to_cpu_and_logs_rejection() {
        let gpu = Device::auto_candidates()[0];
        let backend = MockBackend::new().with_failing_device(gpu);
        let (result, logs) = run(&backend, &params(Device::Auto, None), &CancellationToken::new());
        let (info, _) = result.unwrap();

        assert_eq!(info.device, Device::Cpu);
        assert_eq!(info.compute_type, "int8");
        assert_eq!(
            backend.load_attempts(),
            vec![(gpu, "float16".to_string()), (Device::Cpu, "int8".to_string())]
        );
        assert!(
            logs.iter()
                .any(|l| l.contains(&format!("Device {} unavailable", gpu))),
            "logs: {:?}",
            logs
        );
    }

    #[test]
    fn test_auto_all_candidates_fail() {
        let gpu = Device::auto_candidates()[0];
        let backend = MockBackend::new()
            .with_failing_device(gpu)
            .with_failing_device(Device::Cpu);
        let (result, _) = run(&backend, &params(Device::Auto, None), &CancellationToken::new());
        match result {
            Err(ScribeError::BackendInitFailed { message }) => {
                assert!(message.contains("mock device cpu unavailable"), "{message}");
            }
            other => panic!("expected BackendInitFailed, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_segments_drained_in_order_and_trimmed() {
        let backend = MockBackend::new()
            .with_info(RawRunInfo {
                language: "de".to_string(),
                language_probability: Some(0.93),
                duration: 12.0,
                duration_after_vad: 9.5,
            })
            .with_segments(vec![
                RawSegment::new(0.0, 1.2, " Hallo "),
                RawSegment::new(1.2, 1.2, "   "),
                RawSegment::new(1.2, 3.0, "Welt\n"),
            ]);
        let (result, _) = run(&backend, &params(Device::Cpu, None), &CancellationToken::new());
        let (info, segments) = result.unwrap();

        assert_eq!(info.language, "de");
        assert_eq!(info.language_probability, Some(0.93));
        assert_eq!(info.duration, 12.0);
        assert_eq!(info.duration_after_vad, 9.5);
        assert_eq!(info.model_name, "small");
        assert_eq!(info.beam_size, 5);
        assert!(info.vad_filter);

        let texts: Vec<&str> = segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["Hallo", "", "Welt"]);
        assert_eq!(segments[2].start, 1.2);
        assert_eq!(segments[2].end, 3.0);
    }

    #[test]
    fn test_cancelled_at_entry_loads_nothing() {
        let backend = MockBackend::new();
        let token = CancellationToken::new();
        token.cancel();
        let (result, _) = run(&backend, &params(Device::Auto, None), &token);
        assert!(matches!(result, Err(ScribeError::Cancelled)));
        assert!(backend.load_attempts().is_empty());
    }

    #[test]
    fn test_cancel_observed_after_decoding() {
        let token = CancellationToken::new();
        let backend = MockBackend::new()
            .with_segments(vec![RawSegment::new(0.0, 1.0, "x")])
            .with_cancel_during_transcribe(token.clone());
        let (result, _) = run(&backend, &params(Device::Cpu, None), &token);
        assert!(matches!(result, Err(ScribeError::Cancelled)));
        assert_eq!(backend.transcribed_paths().len(), 1);
    }

    #[test]
    fn test_decoding_failure_propagates() {
        let backend = MockBackend::new().with_transcribe_failure();
        let (result, _) = run(&backend, &params(Device::Cpu, None), &CancellationToken::new());
        assert!(matches!(result, Err(ScribeError::RecognitionFailed { .. })));
    }
}
