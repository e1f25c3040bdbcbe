//! Shared utilities for orchestration tests: a scripted backend.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use torq::backend::{Backend, BackendError, MigrateOutcome};
use torq::config::{DatabaseSettings, NodeSettings, ServerSettings, Settings};
use torq::lifecycle::Lifetime;

/// Every collaborator call, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ConnectDatabase,
    MigrateUp,
    MigrateDown,
    ConnectNode(u32),
    Ingest(u32),
    Serve,
    CloseNode(u32),
    CloseDatabase,
}

/// What one `ingest` call does.
#[derive(Debug, Clone)]
pub enum Attempt {
    /// Store this many events, then report the stream as ended.
    Events(usize),
    /// Store this many events, then fail.
    FailAfter(usize, &'static str),
    /// Run until the lifetime is cancelled.
    UntilCancelled,
    /// Run until the lifetime is cancelled, then fail, like a stream torn
    /// down mid-read.
    FailOnCancel(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockDb;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockNode(pub u32);

/// Scripted failures and outcomes.
#[derive(Debug, Clone)]
pub struct Script {
    pub database_error: Option<&'static str>,
    pub migrate: Result<MigrateOutcome, &'static str>,
    /// Errors for successive `connect_node` calls; calls past the end succeed.
    pub node_errors: VecDeque<Option<&'static str>>,
    /// Successive `ingest` calls; calls past the end run until cancelled.
    pub ingest: VecDeque<Attempt>,
    pub serve_error: Option<&'static str>,
    pub close_node_error: Option<&'static str>,
    pub close_database_error: Option<&'static str>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            database_error: None,
            migrate: Ok(MigrateOutcome::Applied(1)),
            node_errors: VecDeque::new(),
            ingest: VecDeque::new(),
            serve_error: None,
            close_node_error: None,
            close_database_error: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct MockBackend {
    script: Mutex<Script>,
    calls: Mutex<Vec<Call>>,
    nodes: AtomicU32,
    events: AtomicUsize,
    serving: AtomicBool,
}

impl MockBackend {
    pub fn new(script: Script) -> Self {
        Self {
            script: Mutex::new(script),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    pub fn ingest_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Ingest(_)))
            .count()
    }

    pub fn events(&self) -> usize {
        self.events.load(Ordering::SeqCst)
    }

    pub fn is_serving(&self) -> bool {
        self.serving.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }
}

fn fail<T>(error: Option<&'static str>, ok: T) -> Result<T, BackendError> {
    match error {
        Some(message) => Err(BackendError::other(message)),
        None => Ok(ok),
    }
}

#[async_trait]
impl Backend for MockBackend {
    type Database = MockDb;
    type Node = MockNode;

    async fn connect_database(
        &self,
        _settings: &DatabaseSettings,
    ) -> Result<MockDb, BackendError> {
        self.record(Call::ConnectDatabase);
        fail(self.script().database_error, MockDb)
    }

    async fn migrate_up(&self, _db: &MockDb) -> Result<MigrateOutcome, BackendError> {
        self.record(Call::MigrateUp);
        self.script().migrate.map_err(BackendError::other)
    }

    async fn migrate_down(&self, _db: &MockDb) -> Result<MigrateOutcome, BackendError> {
        self.record(Call::MigrateDown);
        self.script().migrate.map_err(BackendError::other)
    }

    async fn connect_node(&self, _settings: &NodeSettings) -> Result<MockNode, BackendError> {
        let id = self.nodes.fetch_add(1, Ordering::SeqCst) + 1;
        self.record(Call::ConnectNode(id));
        let error = self.script().node_errors.pop_front().flatten();
        fail(error, MockNode(id))
    }

    async fn ingest(
        &self,
        lifetime: Lifetime,
        node: &MockNode,
        _db: &MockDb,
    ) -> Result<(), BackendError> {
        self.record(Call::Ingest(node.0));
        let attempt = self
            .script()
            .ingest
            .pop_front()
            .unwrap_or(Attempt::UntilCancelled);

        match attempt {
            Attempt::Events(n) => {
                self.events.fetch_add(n, Ordering::SeqCst);
                Ok(())
            }
            Attempt::FailAfter(n, message) => {
                self.events.fetch_add(n, Ordering::SeqCst);
                Err(BackendError::other(message))
            }
            Attempt::UntilCancelled => {
                lifetime.cancelled().await;
                Ok(())
            }
            Attempt::FailOnCancel(message) => {
                lifetime.cancelled().await;
                Err(BackendError::other(message))
            }
        }
    }

    async fn serve(
        &self,
        lifetime: Lifetime,
        _settings: &ServerSettings,
        _db: &MockDb,
    ) -> Result<(), BackendError> {
        self.record(Call::Serve);
        let serve_error = self.script().serve_error;
        if let Some(message) = serve_error {
            return Err(BackendError::other(message));
        }

        self.serving.store(true, Ordering::SeqCst);
        lifetime.cancelled().await;
        self.serving.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn close_node(&self, node: MockNode) -> Result<(), BackendError> {
        self.record(Call::CloseNode(node.0));
        fail(self.script().close_node_error, ())
    }

    async fn close_database(&self, _db: MockDb) -> Result<(), BackendError> {
        self.record(Call::CloseDatabase);
        fail(self.script().close_database_error, ())
    }
}

/// Defaults with fast restarts and a short shutdown grace period.
pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.ingest.max_restarts = 2;
    settings.ingest.base_delay_ms = 1;
    settings.ingest.max_delay_ms = 5;
    settings.lifecycle.shutdown_timeout_secs = 1;
    settings
}

/// Poll `condition` until it holds, panicking after a generous timeout.
pub async fn eventually<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
