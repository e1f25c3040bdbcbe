//! Lightning node integration subsystem.
//!
//! # Data Flow
//! ```text
//! lnd.tls + lnd.macaroon (files)
//!     → client.rs (authenticated REST session, getinfo handshake)
//!     → subscribe(stream) → newline-delimited JSON byte stream
//!     → ingest::stream decodes and persists each event
//! ```

pub mod client;
pub mod types;

pub use client::{EventBody, NodeConnection};
pub use types::{NodeError, NodeInfo};
