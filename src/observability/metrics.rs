//! Metrics collection and exposition.
//!
//! # Metrics
//! - `torq_ingested_events_total` (counter): events persisted, by stream
//! - `torq_ingest_restarts_total` (counter): ingestion restarts
//! - `torq_task_exits_total` (counter): supervised task exits, by task and outcome
//! - `torq_node_sessions` (gauge): node connections currently open
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_ingested_event(stream: &'static str) {
    counter!("torq_ingested_events_total", "stream" => stream).increment(1);
}

pub fn record_ingest_restart() {
    counter!("torq_ingest_restarts_total").increment(1);
}

pub fn record_task_exit(task: &'static str, outcome: &'static str) {
    counter!("torq_task_exits_total", "task" => task, "outcome" => outcome).increment(1);
}

/// Restarts open a new session before the replaced one is closed, so the
/// gauge counts sessions instead of holding a flag.
pub fn record_node_session_opened() {
    gauge!("torq_node_sessions").increment(1.0);
}

pub fn record_node_session_closed() {
    gauge!("torq_node_sessions").decrement(1.0);
}
