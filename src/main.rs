use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use crossbeam_channel::{Receiver, unbounded};
use mediascribe::cli::{Cli, Commands};
use mediascribe::config::Config;
use mediascribe::defaults;
use mediascribe::diagnostics::check_dependencies;
use mediascribe::output::EventRenderer;
use mediascribe::pipeline::{
    Pipeline, PipelineEvent, StartOutcome, TranscriptionRequest, TranscriptionWorker,
};
use mediascribe::stt::WhisperBackend;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use tracing_subscriber::EnvFilter;

/// Exit status after Ctrl+C (128 + SIGINT).
const EXIT_CANCELLED: u8 = 130;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(
                *shell,
                &mut Cli::command(),
                "mediascribe",
                &mut std::io::stdout(),
            );
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::Check) => {
            let config = load_config(cli.config.as_deref())?;
            if check_dependencies(&config) {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
        None => {
            let config = load_config(cli.config.as_deref())?;
            let request = cli
                .to_request(&config)
                .context("--input is required")?;
            run_transcription(&config, request, cli.quiet)
        }
    }
}

/// Install the stderr subscriber. `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config), which must exist
/// 2. Default config path (~/.config/mediascribe/config.toml)
/// 3. Built-in defaults
///
/// Environment overrides are applied on top of whichever was loaded.
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = match custom_path {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::load_or_default(&Config::default_path())?,
    };
    Ok(config.with_env_overrides()?)
}

/// Run one transcription on the worker and render its events until it ends.
fn run_transcription(
    config: &Config,
    request: TranscriptionRequest,
    quiet: bool,
) -> Result<ExitCode> {
    let backend = WhisperBackend::new(config.models.dir_or_default());
    let pipeline = Pipeline::new(config.pipeline_config(), Arc::new(backend));
    let mut worker = TranscriptionWorker::new(Arc::new(pipeline));
    let interrupts = spawn_interrupt_listener()?;
    let mut renderer = EventRenderer::new(quiet);

    if worker.start(request)? == StartOutcome::AlreadyRunning {
        anyhow::bail!("a transcription is already running");
    }

    loop {
        if interrupts.try_recv().is_ok() {
            if worker.cancel() {
                renderer.render(&PipelineEvent::Log("Cancellation requested…".to_string()));
            } else {
                tracing::info!("cancellation already requested; waiting for the current stage");
            }
        }

        renderer.set_stage(worker.state());
        for event in worker.poll() {
            renderer.render(&event);
            match event {
                PipelineEvent::Log(_) => {}
                PipelineEvent::Completed(_) => return Ok(ExitCode::SUCCESS),
                PipelineEvent::Cancelled => return Ok(ExitCode::from(EXIT_CANCELLED)),
                PipelineEvent::Failed(_) => return Ok(ExitCode::FAILURE),
            }
        }

        thread::sleep(defaults::UI_POLL_INTERVAL);
    }
}

/// Forward every Ctrl+C to the returned channel.
///
/// Runs a current-thread tokio runtime on its own thread so the render loop
/// stays synchronous.
fn spawn_interrupt_listener() -> Result<Receiver<()>> {
    let (tx, rx) = unbounded();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to create signal runtime")?;

    thread::Builder::new()
        .name("signals".to_string())
        .spawn(move || {
            runtime.block_on(async {
                while tokio::signal::ctrl_c().await.is_ok() {
                    if tx.send(()).is_err() {
                        break;
                    }
                }
            });
        })
        .context("failed to spawn signal thread")?;

    Ok(rx)
}
