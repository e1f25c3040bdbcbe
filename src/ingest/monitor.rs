//! Node event monitor: one subscription into the event table.

use futures_util::StreamExt;
use sea_orm::DatabaseConnection;

use crate::backend::BackendError;
use crate::config::EventStream;
use crate::ingest::stream::{decode_message, LineDecoder};
use crate::lifecycle::Lifetime;
use crate::lnd::{NodeConnection, NodeError};
use crate::observability::metrics;
use crate::storage;

/// Subscribe to `stream` and persist every event until the node closes the
/// subscription or the lifetime is cancelled.
///
/// Cancellation is a clean stop. A node that ends the stream is also a clean
/// stop; the caller decides whether that warrants a restart.
pub async fn ingest_stream(
    lifetime: Lifetime,
    node: &NodeConnection,
    db: &DatabaseConnection,
    stream: EventStream,
) -> Result<(), BackendError> {
    let mut body = tokio::select! {
        _ = lifetime.cancelled() => return Ok(()),
        body = node.subscribe(stream) => body?,
    };

    let mut decoder = LineDecoder::new();
    let mut ingested = 0u64;

    loop {
        let chunk = tokio::select! {
            _ = lifetime.cancelled() => {
                tracing::debug!(stream = %stream, ingested, "Stopping event monitor");
                return Ok(());
            }
            chunk = body.next() => chunk,
        };

        let Some(chunk) = chunk else {
            if let Some(tail) = decoder.finish() {
                ingested += persist(db, stream, &tail).await?;
            }
            tracing::info!(
                stream = %stream,
                node = %node.info().alias,
                ingested,
                "Node closed the event stream"
            );
            return Ok(());
        };

        let chunk = chunk.map_err(NodeError::from)?;
        for line in decoder.push(&chunk) {
            ingested += persist(db, stream, &line).await?;
        }
    }
}

async fn persist(
    db: &DatabaseConnection,
    stream: EventStream,
    line: &str,
) -> Result<u64, BackendError> {
    let Some(payload) = decode_message(stream, line)? else {
        return Ok(0);
    };

    let row = storage::insert_event(db, stream, payload).await?;
    tracing::debug!(stream = %stream, id = row.id, "Stored node event");
    metrics::record_ingested_event(stream.as_str());
    Ok(1)
}
