//! Torq: lightning node monitoring daemon library.

pub mod api;
pub mod backend;
pub mod commands;
pub mod config;
pub mod error;
pub mod ingest;
pub mod lifecycle;
pub mod lnd;
pub mod observability;
pub mod resilience;
pub mod storage;

pub use backend::{Backend, BackendError, LiveBackend, MigrateOutcome};
pub use config::Settings;
pub use error::RunError;
