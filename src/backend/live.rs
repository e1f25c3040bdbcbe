//! Production backend: Postgres, LND REST and the Axum API.

use std::time::Duration;

use async_trait::async_trait;
use sea_orm::DatabaseConnection;

use crate::api::ApiServer;
use crate::backend::{Backend, BackendError, MigrateOutcome};
use crate::config::{DatabaseSettings, EventStream, NodeSettings, ServerSettings, Settings};
use crate::ingest;
use crate::lifecycle::{Lifetime, Supervisor, SupervisorError, Task, TaskError};
use crate::lnd::NodeConnection;
use crate::storage;

#[derive(Debug, Clone)]
pub struct LiveBackend {
    streams: Vec<EventStream>,
    grace: Duration,
}

impl LiveBackend {
    pub fn new(settings: &Settings) -> Self {
        Self {
            streams: settings.ingest.streams.clone(),
            grace: Duration::from_secs(settings.lifecycle.shutdown_timeout_secs),
        }
    }
}

#[async_trait]
impl Backend for LiveBackend {
    type Database = DatabaseConnection;
    type Node = NodeConnection;

    async fn connect_database(
        &self,
        settings: &DatabaseSettings,
    ) -> Result<Self::Database, BackendError> {
        Ok(storage::connect(settings).await?)
    }

    async fn migrate_up(&self, db: &Self::Database) -> Result<MigrateOutcome, BackendError> {
        Ok(storage::migrate_up(db).await?)
    }

    async fn migrate_down(&self, db: &Self::Database) -> Result<MigrateOutcome, BackendError> {
        Ok(storage::migrate_down(db).await?)
    }

    async fn connect_node(&self, settings: &NodeSettings) -> Result<Self::Node, BackendError> {
        Ok(NodeConnection::connect(settings).await?)
    }

    /// One monitor per configured stream; the first failing stream stops
    /// the others.
    async fn ingest(
        &self,
        lifetime: Lifetime,
        node: &Self::Node,
        db: &Self::Database,
    ) -> Result<(), BackendError> {
        let tasks = self
            .streams
            .iter()
            .map(|&stream| {
                let node = node.clone();
                let db = db.clone();
                Task::new(stream.as_str(), move |lifetime| async move {
                    ingest::ingest_stream(lifetime, &node, &db, stream)
                        .await
                        .map_err(TaskError::Ingestion)
                })
            })
            .collect();

        // A child lifetime: cancelling the run stops the streams, while a
        // failing stream only ends this attempt.
        let attempt = lifetime.child();
        match Supervisor::new(attempt).with_grace(self.grace).join(tasks).await {
            Ok(()) => Ok(()),
            // Cancelled before the streams could launch.
            Err(SupervisorError::LifetimeClosed(_)) if lifetime.is_cancelled() => Ok(()),
            Err(SupervisorError::Task(TaskError::Ingestion(e))) => Err(e),
            Err(e) => Err(e.into()),
        }
    }

    async fn serve(
        &self,
        lifetime: Lifetime,
        settings: &ServerSettings,
        db: &Self::Database,
    ) -> Result<(), BackendError> {
        ApiServer::new(settings, db.clone()).run(lifetime).await?;
        Ok(())
    }

    async fn close_node(&self, node: Self::Node) -> Result<(), BackendError> {
        node.close();
        Ok(())
    }

    async fn close_database(&self, db: Self::Database) -> Result<(), BackendError> {
        Ok(storage::close(db).await?)
    }
}
