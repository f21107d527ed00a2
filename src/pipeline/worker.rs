//! Background worker that runs the pipeline off the presentation thread.
//!
//! The foreground only calls `start`, `cancel` and `poll`; none of them block.
//! Events cross lanes through one unbounded crossbeam channel in the order
//! the pipeline produced them.

use crate::cancel::CancellationToken;
use crate::error::Result;
use crate::pipeline::orchestrator::Pipeline;
use crate::pipeline::types::{PipelineEvent, PipelineState, TranscriptionRequest};
use crossbeam_channel::{Receiver, unbounded};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Result of a start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// A run is already active; the request was ignored.
    AlreadyRunning,
}

struct ActiveRun {
    token: CancellationToken,
    events: Receiver<PipelineEvent>,
    handle: Option<JoinHandle<()>>,
    cancel_requested: bool,
}

/// Runs at most one transcription at a time on a named background thread.
pub struct TranscriptionWorker {
    pipeline: Arc<Pipeline>,
    active: Option<ActiveRun>,
}

impl std::fmt::Debug for TranscriptionWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscriptionWorker")
            .field("pipeline", &self.pipeline)
            .field("running", &self.is_running())
            .finish()
    }
}

impl TranscriptionWorker {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            active: None,
        }
    }

    /// Start a run. A second start while one is active is a no-op.
    ///
    /// # Errors
    /// Returns `ScribeError::Io` if the background thread cannot be spawned.
    pub fn start(&mut self, request: TranscriptionRequest) -> Result<StartOutcome> {
        if self.active.is_some() {
            return Ok(StartOutcome::AlreadyRunning);
        }

        let token = CancellationToken::new();
        let (tx, rx) = unbounded();
        let pipeline = Arc::clone(&self.pipeline);
        let run_token = token.clone();

        let handle = thread::Builder::new()
            .name("transcription".to_string())
            .spawn(move || {
                let events = tx.clone();
                let outcome = catch_unwind(AssertUnwindSafe(|| {
                    // Errors are reported through the terminal event.
                    let _result = pipeline.run(&request, &run_token, &mut |event| {
                        // The receiver only goes away when the worker is dropped.
                        if events.send(event).is_err() {
                            tracing::debug!("event receiver dropped");
                        }
                    });
                }));
                if let Err(panic_info) = outcome {
                    let msg = panic_message(&*panic_info);
                    tracing::error!(panic = %msg, "transcription thread panicked");
                    pipeline.mark_failed();
                    if tx
                        .send(PipelineEvent::Failed(format!("internal error: {msg}")))
                        .is_err()
                    {
                        tracing::debug!("event receiver dropped");
                    }
                }
            })?;

        self.active = Some(ActiveRun {
            token,
            events: rx,
            handle: Some(handle),
            cancel_requested: false,
        });
        Ok(StartOutcome::Started)
    }

    /// Request cancellation of the active run.
    ///
    /// Returns true if this call set the token. Repeated requests are ignored
    /// until the run's terminal event has been polled.
    pub fn cancel(&mut self) -> bool {
        match &mut self.active {
            Some(run) if !run.cancel_requested => {
                run.cancel_requested = true;
                run.token.cancel();
                true
            }
            _ => false,
        }
    }

    /// Drain all pending events without blocking.
    ///
    /// Once the terminal event is returned the worker is idle again.
    pub fn poll(&mut self) -> Vec<PipelineEvent> {
        let Some(run) = &mut self.active else {
            return Vec::new();
        };

        let events: Vec<PipelineEvent> = run.events.try_iter().collect();
        if events.iter().any(PipelineEvent::is_terminal) {
            // The terminal event is the thread's last act, so this join is short.
            if let Some(handle) = run.handle.take()
                && handle.join().is_err()
            {
                tracing::warn!("transcription thread ended with a panic");
            }
            self.active = None;
        }
        events
    }

    /// True from `start` until the terminal event has been polled.
    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// Stage of the current (or last) run.
    pub fn state(&self) -> PipelineState {
        self.pipeline.state()
    }
}

impl Drop for TranscriptionWorker {
    fn drop(&mut self) {
        // The thread is detached; it stops at its next cancellation checkpoint.
        if let Some(run) = &self.active {
            run.token.cancel();
        }
    }
}

fn panic_message(panic_info: &(dyn std::any::Any + Send)) -> String {
    panic_info
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic_info.downcast_ref::<String>().map(|s| s.as_str()))
        .unwrap_or("unknown panic")
        .to_string()
}
