//! Torq daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!   LND (REST) ──▶ lnd ──▶ ingest ──▶ storage ◀── api ◀── API clients
//!                   ▲        │
//!                   └────────┘ restart with backoff
//!
//!   lifecycle: startup (db → migrate → node) → supervise → release
//!   cross-cutting: config, observability, resilience
//! ```

use std::process::ExitCode;

use clap::Parser;

use torq::commands;
use torq::config::{self, Cli, Command};
use torq::lifecycle::{signals, Lifetime};
use torq::observability::{logging, metrics};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match config::resolve(&cli.overrides) {
        Ok(settings) => settings,
        Err(e) => {
            logging::init_logging("info");
            tracing::error!(error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    logging::init_logging(&settings.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), command = ?cli.command, "torq starting");

    if settings.observability.metrics_enabled {
        match settings.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %settings.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let lifetime = Lifetime::new();
    if matches!(cli.command, Command::Start | Command::Subscribe) {
        signals::cancel_on_signal(lifetime.clone());
    }

    match commands::dispatch(cli.command, &settings, lifetime).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) if e.is_cancellation() => {
            tracing::info!("Stopped by signal, shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "torq exited with an error");
            ExitCode::FAILURE
        }
    }
}
