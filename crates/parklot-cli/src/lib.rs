//! parklot-cli: command line runner for the parking-lot simulation.

mod args;
mod logging;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use parklot::{BatchReport, CancellationToken, Completion, ConsoleSink, Launcher, LauncherError};

pub use args::{Args, OutputFormat};
pub use logging::init_tracing;

/// Exit status when the wait for cars was interrupted (128 + SIGINT).
pub const EXIT_INTERRUPTED: u8 = 130;
pub const EXIT_INVALID_CONFIG: u8 = 2;

/// Run one batch. Ctrl-C interrupts the wait, not the cars.
pub async fn run(args: &Args) -> Result<BatchReport, LauncherError> {
    let sink = Arc::new(ConsoleSink::new(args.format.into()));
    let launcher = Launcher::with_sink(args.to_config(), sink);

    let wait_cancel = CancellationToken::new();
    let interrupt = {
        let wait_cancel = wait_cancel.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Interrupt received - no longer waiting for cars");
                    wait_cancel.cancel();
                }
                Err(e) => tracing::warn!(error = %e, "Failed to listen for Ctrl-C"),
            }
        })
    };

    let result = launcher.run(&wait_cancel).await;
    interrupt.abort();
    result
}

/// The batch report as one JSON line, for `--format json`.
pub fn render_json(report: &BatchReport) -> anyhow::Result<String> {
    serde_json::to_string(report).context("failed to serialize batch report")
}

pub fn exit_code(report: &BatchReport) -> ExitCode {
    match report.completion {
        Completion::AllFinished => ExitCode::SUCCESS,
        Completion::WaitInterrupted => ExitCode::from(EXIT_INTERRUPTED),
    }
}

pub fn error_exit_code(err: &LauncherError) -> ExitCode {
    match err {
        LauncherError::Config(_) => ExitCode::from(EXIT_INVALID_CONFIG),
        LauncherError::Pool(_) => ExitCode::FAILURE,
    }
}
