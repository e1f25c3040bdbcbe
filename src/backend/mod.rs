//! External collaborators behind a single seam.
//!
//! The orchestration in [`crate::lifecycle`] and [`crate::commands`] only
//! talks to a [`Backend`]. [`LiveBackend`] wires the real Postgres database,
//! LND node and API server; tests substitute a scripted implementation.

pub mod live;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{DatabaseSettings, NodeSettings, ServerSettings};
use crate::lifecycle::Lifetime;
use crate::lifecycle::supervisor::SupervisorError;
use crate::lnd::NodeError;

pub use live::LiveBackend;

/// Result of a migration step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrateOutcome {
    /// This many migrations were applied (or rolled back).
    Applied(usize),
    /// Nothing pending; the schema already matches.
    NoChange,
}

/// Errors raised by a backend collaborator.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error(transparent)]
    Node(#[from] NodeError),

    #[error("server error: {0}")]
    Server(#[from] std::io::Error),

    #[error(transparent)]
    Supervision(Box<SupervisorError>),

    #[error("{0}")]
    Other(String),
}

impl BackendError {
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

impl From<SupervisorError> for BackendError {
    fn from(err: SupervisorError) -> Self {
        Self::Supervision(Box::new(err))
    }
}

/// Every external collaborator the daemon depends on.
///
/// Handles are cheap clones of a shared, internally synchronized resource
/// (a connection pool, an HTTP client); `close_*` releases the underlying
/// resource for all clones and is called exactly once, by the shutdown
/// coordinator.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    type Database: Clone + Send + Sync + 'static;
    type Node: Clone + Send + Sync + 'static;

    async fn connect_database(
        &self,
        settings: &DatabaseSettings,
    ) -> Result<Self::Database, BackendError>;

    /// Apply every pending migration.
    async fn migrate_up(&self, db: &Self::Database) -> Result<MigrateOutcome, BackendError>;

    /// Roll back the most recent migration.
    async fn migrate_down(&self, db: &Self::Database) -> Result<MigrateOutcome, BackendError>;

    async fn connect_node(&self, settings: &NodeSettings) -> Result<Self::Node, BackendError>;

    /// Consume node events and persist them until the streams end or the
    /// lifetime is cancelled. Returns `Ok` on cancellation.
    async fn ingest(
        &self,
        lifetime: Lifetime,
        node: &Self::Node,
        db: &Self::Database,
    ) -> Result<(), BackendError>;

    /// Serve the API until the lifetime is cancelled.
    async fn serve(
        &self,
        lifetime: Lifetime,
        settings: &ServerSettings,
        db: &Self::Database,
    ) -> Result<(), BackendError>;

    async fn close_node(&self, node: Self::Node) -> Result<(), BackendError>;

    async fn close_database(&self, db: Self::Database) -> Result<(), BackendError>;
}
