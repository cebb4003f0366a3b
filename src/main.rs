//! dbping binary
//!
//! Exits with a failure status when configuration, server start, client
//! construction, or the ping itself fails.

use clap::Parser;
use dbping::cli::Cli;
use dbping::config::ProcessEnv;
use dbping::server::{EmbeddedLauncher, LogSink};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_sink());

    match dbping::run::run(&cli.run_options(), &ProcessEnv, &EmbeddedLauncher::default()).await {
        Ok(report) => {
            tracing::info!(elapsed_ms = report.elapsed.as_millis() as u64, "ping successful");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(step = e.step(), error = %e, "postgres check failed");
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG`, or `info` when unset, with the embedded server's targets
/// filtered according to `sink` on top.
fn init_tracing(sink: LogSink) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(sink.apply(filter))
        .with_target(false)
        .init();
}
