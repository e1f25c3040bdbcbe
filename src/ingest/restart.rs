//! Restarting ingestion after node failures.
//!
//! # Design Decisions
//! - A failed attempt reconnects to the node before trying again
//! - The connection acquired at startup stays owned by the shutdown
//!   coordinator; connections made here are closed here
//! - Cancellation is a clean stop, also when the attempt it interrupted
//!   returned an error

use std::sync::Arc;

use crate::backend::{Backend, BackendError};
use crate::config::NodeSettings;
use crate::lifecycle::{Lifetime, TaskError};
use crate::observability::metrics;
use crate::resilience::RestartPolicy;

/// Run `backend.ingest` until it finishes, the lifetime is cancelled or the
/// restart budget in `policy` is spent.
pub async fn supervised<B: Backend>(
    backend: Arc<B>,
    lifetime: Lifetime,
    node: B::Node,
    db: B::Database,
    settings: NodeSettings,
    policy: RestartPolicy,
) -> Result<(), TaskError> {
    let mut current = node;
    let mut owned: Option<B::Node> = None;
    let mut restarts = 0u32;

    let result = loop {
        let result = backend.ingest(lifetime.clone(), &current, &db).await;
        if lifetime.is_cancelled() {
            if let Err(e) = &result {
                tracing::warn!(error = %e, "Ingestion error during shutdown");
            }
            break Ok(());
        }
        let mut failure = match result {
            Ok(()) => break Ok(()),
            Err(e) => e,
        };

        // Back off and reconnect; a failed reconnect uses up another restart.
        let fresh = loop {
            restarts += 1;
            let Some(delay) = policy.delay(restarts) else {
                return finish(&backend, owned, Err(exhausted(restarts - 1, failure))).await;
            };

            tracing::warn!(
                error = %failure,
                restart = restarts,
                max_restarts = policy.max_restarts,
                delay_ms = delay.as_millis() as u64,
                "Ingestion failed, restarting"
            );
            metrics::record_ingest_restart();

            tokio::select! {
                _ = lifetime.cancelled() => return finish(&backend, owned, Ok(())).await,
                _ = tokio::time::sleep(delay) => {}
            }

            match backend.connect_node(&settings).await {
                Ok(fresh) => break fresh,
                Err(e) => failure = e,
            }
        };

        if let Some(previous) = owned.replace(fresh.clone()) {
            release(&backend, previous).await;
        }
        current = fresh;
    };

    finish(&backend, owned, result).await
}

fn exhausted(restarts: u32, source: BackendError) -> TaskError {
    if restarts == 0 {
        TaskError::Ingestion(source)
    } else {
        TaskError::RestartBudgetExhausted { restarts, source }
    }
}

async fn finish<B: Backend>(
    backend: &Arc<B>,
    owned: Option<B::Node>,
    result: Result<(), TaskError>,
) -> Result<(), TaskError> {
    if let Some(node) = owned {
        release(backend, node).await;
    }
    result
}

async fn release<B: Backend>(backend: &Arc<B>, node: B::Node) {
    if let Err(e) = backend.close_node(node).await {
        tracing::warn!(error = %e, "Failed to close replaced node connection");
    }
}
