//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the daemon.
//! Section and key names mirror the `--section.key` command-line flags so a
//! config file entry `[db] name = "torq"` and the flag `--db.name torq` set
//! the same value.

use serde::{Deserialize, Serialize};

/// Root configuration for the daemon.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// API server settings (`torq.*`).
    pub torq: ServerSettings,

    /// Database coordinates and credentials (`db.*`).
    pub db: DatabaseSettings,

    /// Lightning node connection details (`lnd.*`).
    pub lnd: NodeSettings,

    /// Ingestion restart policy and stream selection.
    pub ingest: IngestSettings,

    /// Task supervision settings.
    pub lifecycle: LifecycleSettings,

    /// Logging and metrics.
    pub observability: ObservabilitySettings,
}

/// API server configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerSettings {
    /// Password used to access the API.
    pub password: String,

    /// Host the API binds to (and the `call` command connects to).
    pub host: String,

    /// Port the API binds to.
    pub port: u16,

    /// Path to the PEM certificate served by the API.
    pub cert: String,

    /// Path to the PEM private key served by the API.
    pub key: String,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            password: String::new(),
            host: "localhost".to_string(),
            port: 8081,
            cert: "./cert.pem".to_string(),
            key: "./key.pem".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Postgres connection settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DatabaseSettings {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,

    /// Upper bound of the connection pool.
    pub max_connections: u32,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            name: "torq".to_string(),
            host: "localhost".to_string(),
            port: 5432,
            user: "torq".to_string(),
            password: "password".to_string(),
            max_connections: 10,
            connect_timeout_secs: 10,
        }
    }
}

/// Default port of LND's REST listener (`restlisten`). The gRPC port
/// (10009) does not serve the REST API.
pub const LND_REST_PORT: u16 = 8080;

/// LND connection settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct NodeSettings {
    /// `host:port` of the node's REST endpoint.
    pub node_address: String,

    /// Path to the node's `tls.cert`.
    pub tls: String,

    /// Path to the node's `admin.macaroon`.
    pub macaroon: String,

    /// Timeout for unary calls (the connect handshake) in seconds.
    pub rpc_timeout_secs: u64,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            node_address: format!("localhost:{LND_REST_PORT}"),
            tls: String::new(),
            macaroon: String::new(),
            rpc_timeout_secs: 10,
        }
    }
}

/// Node event streams that can be ingested.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventStream {
    Invoices,
    Channels,
    Transactions,
}

impl EventStream {
    /// Stable name used for storage rows, logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStream::Invoices => "invoices",
            EventStream::Channels => "channels",
            EventStream::Transactions => "transactions",
        }
    }
}

impl std::fmt::Display for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ingestion settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct IngestSettings {
    /// Streams subscribed to while ingesting.
    pub streams: Vec<EventStream>,

    /// How many times a failed ingestion is restarted before giving up.
    /// Zero disables restarts.
    pub max_restarts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            streams: vec![
                EventStream::Invoices,
                EventStream::Channels,
                EventStream::Transactions,
            ],
            max_restarts: 5,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
        }
    }
}

/// Task supervision settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LifecycleSettings {
    /// Seconds tasks get to return after the lifetime is cancelled before
    /// they are aborted.
    pub shutdown_timeout_secs: u64,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            shutdown_timeout_secs: 10,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilitySettings {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_cli_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.db.name, "torq");
        assert_eq!(settings.db.port, 5432);
        assert_eq!(settings.lnd.node_address, "localhost:8080");
        assert_eq!(settings.torq.port, 8081);
        assert_eq!(settings.ingest.streams.len(), 3);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [db]
            host = "db.internal"

            [ingest]
            streams = ["invoices"]
            "#,
        )
        .unwrap();

        assert_eq!(settings.db.host, "db.internal");
        assert_eq!(settings.db.user, "torq");
        assert_eq!(settings.ingest.streams, vec![EventStream::Invoices]);
        assert_eq!(settings.ingest.max_restarts, 5);
    }
}
