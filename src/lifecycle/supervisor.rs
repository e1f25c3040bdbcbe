//! Concurrent task supervision.
//!
//! # Responsibilities
//! - Launch long-lived tasks under one shared [`Lifetime`]
//! - Cancel the lifetime on the first task failure
//! - Report the first failure as the result, log the rest
//! - Bound how long tasks may take to stop once the lifetime is cancelled
//!
//! # Design Decisions
//! - "First" is chronological: the failure recorded on the lifetime first
//! - Detached mode still joins its background tasks once the foreground
//!   task returns, so a background failure is never dropped
//! - Cancellation is cooperative; only tasks that outlive the shutdown grace
//!   period are aborted

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use thiserror::Error;
use tokio::task::{Id, JoinError, JoinSet};
use tokio::time::Instant;

use crate::backend::BackendError;
use crate::lifecycle::lifetime::{Lifetime, LifetimeClosed};
use crate::observability::metrics;

/// Shutdown grace period used when none is configured.
pub const DEFAULT_GRACE: Duration = Duration::from_secs(10);

/// Terminal error of a supervised task.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("ingestion failed: {0}")]
    Ingestion(#[source] BackendError),

    #[error("ingestion gave up after {restarts} restarts: {source}")]
    RestartBudgetExhausted {
        restarts: u32,
        #[source]
        source: BackendError,
    },

    #[error("serving loop failed: {0}")]
    Serving(#[source] BackendError),

    #[error("task '{task}' panicked")]
    Panicked { task: &'static str },

    #[error("task '{task}' did not stop within {grace:?} of shutdown")]
    ShutdownTimeout { task: &'static str, grace: Duration },
}

/// Result of a supervised run that did not complete cleanly.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error(transparent)]
    Task(#[from] TaskError),

    #[error("cancelled before any task failed")]
    Cancelled,

    #[error(transparent)]
    LifetimeClosed(#[from] LifetimeClosed),
}

type TaskFuture = BoxFuture<'static, Result<(), TaskError>>;

/// A named unit of long-running work.
pub struct Task {
    name: &'static str,
    run: Box<dyn FnOnce(Lifetime) -> TaskFuture + Send>,
}

impl Task {
    pub fn new<F, Fut>(name: &'static str, f: F) -> Self
    where
        F: FnOnce(Lifetime) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        Self {
            name,
            run: Box::new(move |lifetime| f(lifetime).boxed()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task").field("name", &self.name).finish()
    }
}

/// Supervision strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Run every task concurrently and wait for all of them.
    Join,
    /// Run the last task in the caller, the others in the background.
    Detached,
}

/// Run `tasks` under `lifetime` with the given mode.
pub async fn run(
    lifetime: &Lifetime,
    mut tasks: Vec<Task>,
    mode: Mode,
    grace: Duration,
) -> Result<(), SupervisorError> {
    let supervisor = Supervisor::new(lifetime.clone()).with_grace(grace);
    match mode {
        Mode::Join => supervisor.join(tasks).await,
        Mode::Detached => match tasks.pop() {
            Some(foreground) => supervisor.detach(tasks, foreground).await,
            None => Ok(()),
        },
    }
}

struct Outcome {
    result: Result<(), TaskError>,
    first: bool,
}

/// Spawned tasks and their names, keyed by task id.
#[derive(Default)]
struct Running {
    set: JoinSet<Outcome>,
    names: HashMap<Id, &'static str>,
}

impl Running {
    fn spawn<F>(&mut self, name: &'static str, future: F)
    where
        F: Future<Output = Outcome> + Send + 'static,
    {
        let id = self.set.spawn(future).id();
        self.names.insert(id, name);
    }

    /// Next task to finish, or `None` once the set is empty.
    async fn join_next(&mut self) -> Option<(&'static str, Result<Outcome, JoinError>)> {
        let (id, joined) = match self.set.join_next_with_id().await? {
            Ok((id, outcome)) => (id, Ok(outcome)),
            Err(e) => (e.id(), Err(e)),
        };
        let name = self.names.remove(&id).unwrap_or("unknown");
        Some((name, joined))
    }
}

enum Next {
    Joined(&'static str, Result<Outcome, JoinError>),
    Cancelled,
    Elapsed,
    Done,
}

/// Runs a fixed set of tasks under one lifetime.
pub struct Supervisor {
    lifetime: Lifetime,
    grace: Duration,
}

impl Supervisor {
    pub fn new(lifetime: Lifetime) -> Self {
        Self {
            lifetime,
            grace: DEFAULT_GRACE,
        }
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Join mode: launch everything, wait for everything.
    pub async fn join(&self, tasks: Vec<Task>) -> Result<(), SupervisorError> {
        let mut running = self.launch(tasks)?;
        let mut first = None;
        self.drain(&mut running, &mut first).await;
        self.conclude(first)
    }

    /// Detached mode: `background` runs on the runtime while `foreground`
    /// runs in the caller. Once the foreground returns the lifetime winds
    /// down and the background results are merged into the outcome.
    pub async fn detach(
        &self,
        background: Vec<Task>,
        foreground: Task,
    ) -> Result<(), SupervisorError> {
        let mut running = self.launch(background)?;

        tracing::debug!(task = foreground.name, "Running task in the foreground");
        let name = foreground.name;
        let run = (foreground.run)(self.lifetime.clone());
        let outcome = guarded(self.lifetime.clone(), name, run).await;

        let mut first = None;
        self.observe(name, Ok(outcome), &mut first);

        self.lifetime.wind_down();
        self.drain(&mut running, &mut first).await;
        self.conclude(first)
    }

    fn launch(&self, tasks: Vec<Task>) -> Result<Running, LifetimeClosed> {
        self.lifetime.launch()?;

        let mut running = Running::default();
        for task in tasks {
            let name = task.name;
            let future = guarded(self.lifetime.clone(), name, (task.run)(self.lifetime.clone()));
            running.spawn(name, future);
            tracing::debug!(task = name, "Task launched");
        }
        Ok(running)
    }

    async fn drain(&self, running: &mut Running, first: &mut Option<TaskError>) {
        let mut deadline: Option<Instant> = None;

        loop {
            if deadline.is_none() && self.lifetime.is_cancelled() {
                deadline = Some(Instant::now() + self.grace);
            }

            let next = match deadline {
                None => tokio::select! {
                    joined = running.join_next() => match joined {
                        Some((name, joined)) => Next::Joined(name, joined),
                        None => Next::Done,
                    },
                    _ = self.lifetime.cancelled() => Next::Cancelled,
                },
                Some(at) => match tokio::time::timeout_at(at, running.join_next()).await {
                    Ok(Some((name, joined))) => Next::Joined(name, joined),
                    Ok(None) => Next::Done,
                    Err(_) => Next::Elapsed,
                },
            };

            match next {
                Next::Joined(name, joined) => self.observe(name, joined, first),
                Next::Cancelled => continue,
                Next::Done => return,
                Next::Elapsed => {
                    tracing::warn!(
                        grace = ?self.grace,
                        remaining = running.set.len(),
                        "Tasks did not stop in time, aborting"
                    );
                    running.set.abort_all();
                    while let Some((name, joined)) = running.join_next().await {
                        self.observe(name, joined, first);
                    }
                    return;
                }
            }
        }
    }

    fn observe(
        &self,
        name: &'static str,
        joined: Result<Outcome, JoinError>,
        first: &mut Option<TaskError>,
    ) {
        let (error, is_first) = match joined {
            Ok(Outcome { result: Ok(()), .. }) => {
                tracing::info!(task = name, "Task finished");
                metrics::record_task_exit(name, "completed");
                return;
            }
            Ok(Outcome {
                result: Err(error),
                first: is_first,
            }) => (error, is_first),
            Err(join_error) => {
                let error = if join_error.is_panic() {
                    TaskError::Panicked { task: name }
                } else {
                    TaskError::ShutdownTimeout {
                        task: name,
                        grace: self.grace,
                    }
                };
                let is_first = self.lifetime.fail(name, &error);
                (error, is_first)
            }
        };

        metrics::record_task_exit(name, "failed");
        if is_first {
            tracing::error!(task = name, error = %error, "Task failed, cancelling sibling tasks");
            *first = Some(error);
        } else {
            tracing::warn!(
                task = name,
                error = %error,
                "Task failed while the run was already stopping"
            );
        }
    }

    fn conclude(&self, first: Option<TaskError>) -> Result<(), SupervisorError> {
        let state = self.lifetime.finish();
        tracing::debug!(state = ?state, "Supervisor finished");

        match first {
            Some(error) => Err(SupervisorError::Task(error)),
            None if self.lifetime.was_cancelled_externally() => Err(SupervisorError::Cancelled),
            None => Ok(()),
        }
    }
}

/// Record a failure on the lifetime the moment the task returns it, so the
/// lifetime is cancelled before anyone joins the task.
async fn guarded(lifetime: Lifetime, name: &'static str, task: TaskFuture) -> Outcome {
    let result = task.await;
    let first = match &result {
        Err(error) => lifetime.fail(name, error),
        Ok(()) => false,
    };
    Outcome { result, first }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::lifetime::State;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn failing(message: &'static str) -> TaskError {
        TaskError::Ingestion(BackendError::other(message))
    }

    fn explode() -> Result<(), TaskError> {
        panic!("bug")
    }

    fn until_cancelled(name: &'static str) -> Task {
        Task::new(name, |lifetime| async move {
            lifetime.cancelled().await;
            Ok(())
        })
    }

    #[tokio::test]
    async fn test_join_all_ok() {
        let lifetime = Lifetime::new();
        let tasks = vec![
            Task::new("a", |_| async { Ok(()) }),
            Task::new("b", |_| async { Ok(()) }),
        ];

        let result = run(&lifetime, tasks, Mode::Join, DEFAULT_GRACE).await;

        assert!(result.is_ok());
        assert_eq!(lifetime.state(), State::Completed);
        assert!(!lifetime.is_cancelled());
    }

    #[tokio::test]
    async fn test_join_first_failure_cancels_siblings() {
        let lifetime = Lifetime::new();
        let sibling_saw_cancel = Arc::new(AtomicBool::new(false));
        let flag = sibling_saw_cancel.clone();

        let tasks = vec![
            Task::new("sibling", move |lifetime| async move {
                lifetime.cancelled().await;
                flag.store(true, Ordering::SeqCst);
                Ok(())
            }),
            Task::new("failing", |_| async { Err(failing("first")) }),
        ];

        let result = run(&lifetime, tasks, Mode::Join, DEFAULT_GRACE).await;

        assert!(matches!(
            result,
            Err(SupervisorError::Task(TaskError::Ingestion(ref e))) if e.to_string() == "first"
        ));
        assert!(lifetime.is_cancelled());
        assert!(sibling_saw_cancel.load(Ordering::SeqCst));
        assert_eq!(lifetime.state(), State::Failed);
    }

    #[tokio::test]
    async fn test_join_reports_chronologically_first_failure() {
        let lifetime = Lifetime::new();
        let tasks = vec![
            Task::new("slow", |lifetime| async move {
                lifetime.cancelled().await;
                Err(failing("second"))
            }),
            Task::new("fast", |_| async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Err(failing("first"))
            }),
        ];

        let result = run(&lifetime, tasks, Mode::Join, DEFAULT_GRACE).await;

        match result {
            Err(SupervisorError::Task(error)) => assert_eq!(error.to_string(), "ingestion failed: first"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(lifetime.first_failure().unwrap().task, "fast");
    }

    #[tokio::test]
    async fn test_join_external_cancel() {
        let lifetime = Lifetime::new();
        let canceller = lifetime.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let tasks = vec![until_cancelled("a"), until_cancelled("b")];
        let result = run(&lifetime, tasks, Mode::Join, DEFAULT_GRACE).await;

        assert!(matches!(result, Err(SupervisorError::Cancelled)));
        assert_eq!(lifetime.state(), State::Cancelled);
    }

    #[tokio::test]
    async fn test_launch_refused_after_cancel() {
        let lifetime = Lifetime::new();
        lifetime.cancel();

        let result = run(&lifetime, vec![until_cancelled("a")], Mode::Join, DEFAULT_GRACE).await;
        assert!(matches!(result, Err(SupervisorError::LifetimeClosed(_))));
    }

    #[tokio::test]
    async fn test_detached_background_failure_is_surfaced() {
        let lifetime = Lifetime::new();
        let supervisor = Supervisor::new(lifetime.clone());

        let background = vec![Task::new("ingest", |_| async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Err(failing("stream broke"))
        })];

        let result = supervisor.detach(background, until_cancelled("serve")).await;

        match result {
            Err(SupervisorError::Task(error)) => assert!(error.to_string().contains("stream broke")),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(lifetime.state(), State::Failed);
    }

    #[tokio::test]
    async fn test_detached_foreground_return_winds_down_background() {
        let lifetime = Lifetime::new();
        let supervisor = Supervisor::new(lifetime.clone());

        let foreground = Task::new("serve", |_| async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(())
        });
        let result = supervisor
            .detach(vec![until_cancelled("ingest")], foreground)
            .await;

        assert!(result.is_ok());
        assert_eq!(lifetime.state(), State::Completed);
        assert!(!lifetime.was_cancelled_externally());
    }

    #[tokio::test]
    async fn test_stuck_task_is_aborted_after_grace() {
        let lifetime = Lifetime::new();
        let tasks = vec![
            Task::new("stuck", |_| async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }),
            Task::new("failing", |_| async { Err(failing("boom")) }),
        ];

        let result = run(&lifetime, tasks, Mode::Join, Duration::from_millis(20)).await;

        match result {
            Err(SupervisorError::Task(TaskError::Ingestion(_))) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_error_after_external_cancel_is_cancellation() {
        let lifetime = Lifetime::new();
        let canceller = lifetime.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let tasks = vec![
            Task::new("ingest", |lifetime| async move {
                lifetime.cancelled().await;
                Err(failing("stream aborted by shutdown"))
            }),
            until_cancelled("serve"),
        ];
        let result = run(&lifetime, tasks, Mode::Join, DEFAULT_GRACE).await;

        assert!(matches!(result, Err(SupervisorError::Cancelled)));
        assert_eq!(lifetime.state(), State::Cancelled);
        assert!(lifetime.first_failure().is_none());
    }

    #[tokio::test]
    async fn test_stuck_task_after_external_cancel_is_aborted() {
        let lifetime = Lifetime::new();
        let canceller = lifetime.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let tasks = vec![Task::new("stuck", |_| async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        })];
        let started = Instant::now();
        let result = run(&lifetime, tasks, Mode::Join, Duration::from_millis(20)).await;

        assert!(matches!(result, Err(SupervisorError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(60));
        assert_eq!(lifetime.state(), State::Cancelled);
    }

    #[tokio::test]
    async fn test_panic_is_reported() {
        let lifetime = Lifetime::new();
        let tasks = vec![
            Task::new("panicky", |_| async { explode() }),
            until_cancelled("other"),
        ];

        let result = run(&lifetime, tasks, Mode::Join, DEFAULT_GRACE).await;

        assert!(matches!(
            result,
            Err(SupervisorError::Task(TaskError::Panicked { task: "panicky" }))
        ));
        assert!(lifetime.is_cancelled());
    }
}
