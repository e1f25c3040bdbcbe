//! Command orchestration.
//!
//! # Data Flow
//! ```text
//! start:
//!     connect (db → migrate → node)
//!     → ingest in the background, serve in the foreground
//!     → release node → release db
//!
//! subscribe:
//!     connect (db → migrate → node)
//!     → ingest, joined
//!     → release node → release db
//! ```
//!
//! Everything here is generic over [`Backend`] so the orchestration runs
//! unchanged against scripted collaborators.

pub mod call;
pub mod migrate;

use std::sync::Arc;
use std::time::Duration;

use crate::backend::{Backend, LiveBackend};
use crate::config::{Command, Settings};
use crate::error::RunError;
use crate::ingest;
use crate::lifecycle::{
    startup, Dependencies, Lifetime, ShutdownCoordinator, Supervisor, Task, TaskError,
};
use crate::resilience::RestartPolicy;

/// Run `command` against the live backend.
pub async fn dispatch(
    command: Command,
    settings: &Settings,
    lifetime: Lifetime,
) -> Result<(), RunError> {
    let backend = Arc::new(LiveBackend::new(settings));

    match command {
        Command::Start => start(backend, settings, lifetime).await,
        Command::Subscribe => subscribe(backend, settings, lifetime).await,
        Command::MigrateUp => migrate::migrate_up(backend, settings).await.map(|_| ()),
        Command::MigrateDown => migrate::migrate_down(backend, settings).await.map(|_| ()),
        Command::Call => Ok(call::call(&settings.torq).await?),
    }
}

/// Ingest in the background and serve the API in the foreground.
pub async fn start<B: Backend>(
    backend: Arc<B>,
    settings: &Settings,
    lifetime: Lifetime,
) -> Result<(), RunError> {
    let mut shutdown = ShutdownCoordinator::new();
    let result = run_start(&backend, settings, lifetime, &mut shutdown).await;
    shutdown.close(result).await
}

/// Ingest only, until the streams end or the run is cancelled.
pub async fn subscribe<B: Backend>(
    backend: Arc<B>,
    settings: &Settings,
    lifetime: Lifetime,
) -> Result<(), RunError> {
    let mut shutdown = ShutdownCoordinator::new();
    let result = run_subscribe(&backend, settings, lifetime, &mut shutdown).await;
    shutdown.close(result).await
}

async fn run_start<B: Backend>(
    backend: &Arc<B>,
    settings: &Settings,
    lifetime: Lifetime,
    shutdown: &mut ShutdownCoordinator,
) -> Result<(), RunError> {
    let deps = startup::connect(backend, settings, shutdown).await?;

    let serving = {
        let backend = backend.clone();
        let server = settings.torq.clone();
        let db = deps.database.clone();
        Task::new("serve", move |lifetime| async move {
            backend
                .serve(lifetime, &server, &db)
                .await
                .map_err(TaskError::Serving)
        })
    };

    supervisor(settings, lifetime)
        .detach(vec![ingest_task(backend, settings, deps)], serving)
        .await?;
    Ok(())
}

async fn run_subscribe<B: Backend>(
    backend: &Arc<B>,
    settings: &Settings,
    lifetime: Lifetime,
    shutdown: &mut ShutdownCoordinator,
) -> Result<(), RunError> {
    let deps = startup::connect(backend, settings, shutdown).await?;

    supervisor(settings, lifetime)
        .join(vec![ingest_task(backend, settings, deps)])
        .await?;
    Ok(())
}

fn supervisor(settings: &Settings, lifetime: Lifetime) -> Supervisor {
    let grace = Duration::from_secs(settings.lifecycle.shutdown_timeout_secs);
    Supervisor::new(lifetime).with_grace(grace)
}

fn ingest_task<B: Backend>(backend: &Arc<B>, settings: &Settings, deps: Dependencies<B>) -> Task {
    let backend = backend.clone();
    let node_settings = settings.lnd.clone();
    let policy = RestartPolicy::from(&settings.ingest);

    Task::new("ingest", move |lifetime| {
        ingest::supervised(backend, lifetime, deps.node, deps.database, node_settings, policy)
    })
}
