//! LND REST types and error definitions.

use serde::Deserialize;
use thiserror::Error;

use crate::config::EventStream;

/// Errors talking to the node.
#[derive(Debug, Error)]
pub enum NodeError {
    /// A credential path was not configured.
    #[error("missing setting {0}")]
    MissingCredential(&'static str),

    /// A credential file could not be read or parsed.
    #[error("failed to load {what} from {path}: {reason}")]
    Credential {
        what: &'static str,
        path: String,
        reason: String,
    },

    #[error("invalid node address '{0}'")]
    Address(String),

    /// Transport-level failure.
    #[error("RPC error: {0}")]
    Rpc(#[from] reqwest::Error),

    /// The node answered with a non-success status.
    #[error("node returned {status}: {body}")]
    Status { status: u16, body: String },

    /// An error frame inside an event stream.
    #[error("stream {stream} error {code}: {message}")]
    Stream {
        stream: EventStream,
        code: i64,
        message: String,
    },

    #[error("malformed message on stream {stream}: {reason}")]
    Malformed { stream: EventStream, reason: String },
}

/// Subset of `GET /v1/getinfo` used for the connect handshake.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct NodeInfo {
    pub identity_pubkey: String,
    pub alias: String,
    pub version: String,
    pub block_height: u32,
    pub synced_to_chain: bool,
}

/// Error frame of a streaming response.
#[derive(Debug, Deserialize)]
pub(crate) struct StreamErrorFrame {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

/// One line of a streaming response: either `{"result": ...}` or
/// `{"error": ...}`.
#[derive(Debug, Deserialize)]
pub(crate) struct StreamFrame {
    pub result: Option<serde_json::Value>,
    pub error: Option<StreamErrorFrame>,
}

impl EventStream {
    /// REST path of the subscription.
    pub fn path(&self) -> &'static str {
        match self {
            EventStream::Invoices => "/v1/invoices/subscribe",
            EventStream::Channels => "/v1/channels/subscribe",
            EventStream::Transactions => "/v1/transactions/subscribe",
        }
    }
}
