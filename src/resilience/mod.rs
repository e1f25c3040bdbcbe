//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Ingestion fails:
//!     → backoff.rs (is a restart left in the budget? how long to wait?)
//!     → ingest::restart reconnects to the node and tries again
//! ```
//!
//! # Design Decisions
//! - Restarts are bounded; an exhausted budget is a terminal task failure
//! - Jittered backoff prevents reconnect storms against the node
//! - Dependency acquisition at startup is never retried

pub mod backoff;

pub use backoff::{calculate_backoff, RestartPolicy};
