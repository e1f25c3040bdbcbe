//! Startup orchestration: acquiring dependencies.
//!
//! # Responsibilities
//! - Open the database, apply pending migrations, connect to the node
//! - Hand every acquired resource to the shutdown coordinator immediately
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal, nothing is retried here
//! - Strictly sequential: database → migrations → node
//! - Tasks are launched only after every dependency is acquired

use std::sync::Arc;

use thiserror::Error;

use crate::backend::{Backend, BackendError, MigrateOutcome};
use crate::config::{DatabaseSettings, NodeSettings, Settings};
use crate::lifecycle::shutdown::ShutdownCoordinator;

/// Errors that abort the run before any task is launched.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("error connecting to db: {0}")]
    DatabaseConnection(#[source] BackendError),

    #[error("error migrating db: {0}")]
    Migration(#[source] BackendError),

    #[error("failed to connect to lnd: {0}")]
    NodeConnection(#[source] BackendError),
}

/// Acquired handles, shared with the tasks by clone.
pub struct Dependencies<B: Backend> {
    pub database: B::Database,
    pub node: B::Node,
}

/// Open the database and register it for release.
pub async fn open_database<B: Backend>(
    backend: &Arc<B>,
    settings: &DatabaseSettings,
    shutdown: &mut ShutdownCoordinator,
) -> Result<B::Database, StartupError> {
    tracing::info!(
        name = %settings.name,
        host = %settings.host,
        port = settings.port,
        "Connecting to the Torq database"
    );
    let database = backend
        .connect_database(settings)
        .await
        .map_err(StartupError::DatabaseConnection)?;

    let releaser = backend.clone();
    let handle = database.clone();
    shutdown.push("database", move || async move { releaser.close_database(handle).await });

    Ok(database)
}

/// Apply pending migrations. "Nothing pending" is success.
pub async fn migrate<B: Backend>(
    backend: &Arc<B>,
    database: &B::Database,
) -> Result<MigrateOutcome, StartupError> {
    tracing::info!("Checking for migrations");
    let outcome = backend
        .migrate_up(database)
        .await
        .map_err(StartupError::Migration)?;

    match outcome {
        MigrateOutcome::NoChange => tracing::info!("Database schema is up to date"),
        MigrateOutcome::Applied(count) => tracing::info!(count, "Applied database migrations"),
    }
    Ok(outcome)
}

/// Connect to the node and register the connection for release.
pub async fn connect_node<B: Backend>(
    backend: &Arc<B>,
    settings: &NodeSettings,
    shutdown: &mut ShutdownCoordinator,
) -> Result<B::Node, StartupError> {
    tracing::info!(address = %settings.node_address, "Connecting to lightning node");
    let node = backend
        .connect_node(settings)
        .await
        .map_err(StartupError::NodeConnection)?;

    let releaser = backend.clone();
    let handle = node.clone();
    shutdown.push("node", move || async move { releaser.close_node(handle).await });

    Ok(node)
}

/// Acquire every dependency in order, failing fast.
///
/// Whatever was acquired before a failure is already registered with
/// `shutdown`, so the caller releases it on its way out.
pub async fn connect<B: Backend>(
    backend: &Arc<B>,
    settings: &Settings,
    shutdown: &mut ShutdownCoordinator,
) -> Result<Dependencies<B>, StartupError> {
    let database = open_database(backend, &settings.db, shutdown).await?;
    migrate(backend, &database).await?;
    let node = connect_node(backend, &settings.lnd, shutdown).await?;

    Ok(Dependencies { database, node })
}
