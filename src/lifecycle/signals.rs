//! OS signal handling.
//!
//! SIGINT (Ctrl+C) and, on unix, SIGTERM cancel the run's lifetime. A second
//! signal is not special-cased: the supervisor's shutdown grace period bounds
//! how long the process keeps running after the first one.

use crate::lifecycle::lifetime::Lifetime;

/// Cancel `lifetime` when the process is asked to stop.
pub fn cancel_on_signal(lifetime: Lifetime) {
    tokio::spawn(async move {
        tokio::select! {
            _ = wait_for_signal() => {
                tracing::info!("Shutdown signal received");
                lifetime.cancel();
            }
            _ = lifetime.cancelled() => {}
        }
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install SIGTERM handler");
            return ctrl_c().await;
        }
    };

    tokio::select! {
        _ = ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    ctrl_c().await
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}
