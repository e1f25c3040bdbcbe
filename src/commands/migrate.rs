//! `migrate_up` / `migrate_down`: database only, no node, no tasks.

use std::sync::Arc;

use crate::backend::{Backend, MigrateOutcome};
use crate::config::Settings;
use crate::error::RunError;
use crate::lifecycle::{startup, ShutdownCoordinator, StartupError};

pub async fn migrate_up<B: Backend>(
    backend: Arc<B>,
    settings: &Settings,
) -> Result<MigrateOutcome, RunError> {
    let mut shutdown = ShutdownCoordinator::new();
    let result = apply(&backend, settings, &mut shutdown).await;
    shutdown.close(result).await
}

pub async fn migrate_down<B: Backend>(
    backend: Arc<B>,
    settings: &Settings,
) -> Result<MigrateOutcome, RunError> {
    let mut shutdown = ShutdownCoordinator::new();
    let result = roll_back(&backend, settings, &mut shutdown).await;
    shutdown.close(result).await
}

async fn apply<B: Backend>(
    backend: &Arc<B>,
    settings: &Settings,
    shutdown: &mut ShutdownCoordinator,
) -> Result<MigrateOutcome, RunError> {
    let database = startup::open_database(backend, &settings.db, shutdown).await?;
    Ok(startup::migrate(backend, &database).await?)
}

async fn roll_back<B: Backend>(
    backend: &Arc<B>,
    settings: &Settings,
    shutdown: &mut ShutdownCoordinator,
) -> Result<MigrateOutcome, RunError> {
    let database = startup::open_database(backend, &settings.db, shutdown).await?;
    let outcome = backend
        .migrate_down(&database)
        .await
        .map_err(StartupError::Migration)?;

    match outcome {
        MigrateOutcome::NoChange => tracing::info!("No migration to roll back"),
        MigrateOutcome::Applied(count) => tracing::info!(count, "Rolled back database migrations"),
    }
    Ok(outcome)
}
