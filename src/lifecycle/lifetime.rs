//! Shared cancellable scope for concurrently running tasks.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

/// Supervision state of a lifetime.
///
/// ```text
/// NotStarted ──launch──▶ Running ──all tasks Ok──▶ Completed
///                           │
///                           ├──first task error──▶ Failed
///                           └──external cancel───▶ Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    NotStarted,
    Running,
    Completed,
    Cancelled,
    Failed,
}

/// The first task failure recorded on a lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub task: &'static str,
    pub message: String,
}

/// Returned when launching under a lifetime that was already cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("lifetime is cancelled, no new task may be started")]
pub struct LifetimeClosed;

#[derive(Debug)]
struct Inner {
    state: State,
    externally_cancelled: bool,
    failure: Option<Failure>,
}

/// Cancellable execution scope shared by every supervised task.
///
/// Cancellation is cooperative: tasks select on [`Lifetime::cancelled`] and
/// return promptly once it fires.
#[derive(Debug, Clone)]
pub struct Lifetime {
    token: CancellationToken,
    inner: Arc<Mutex<Inner>>,
}

impl Lifetime {
    pub fn new() -> Self {
        Self::from_token(CancellationToken::new())
    }

    fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            inner: Arc::new(Mutex::new(Inner {
                state: State::NotStarted,
                externally_cancelled: false,
                failure: None,
            })),
        }
    }

    /// A nested lifetime, cancelled together with this one.
    ///
    /// Failures inside the child cancel the child only; they reach the parent
    /// through the child supervisor's return value.
    pub fn child(&self) -> Self {
        Self::from_token(self.token.child_token())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A poisoned lock only means a panic happened while holding it; the
        // state itself is always left consistent.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> State {
        self.lock().state
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the lifetime is cancelled, for any reason.
    pub fn cancelled(&self) -> WaitForCancellationFutureOwned {
        self.token.clone().cancelled_owned()
    }

    /// Cancel from outside (signal, parent shutdown).
    pub fn cancel(&self) {
        {
            let mut inner = self.lock();
            inner.externally_cancelled = true;
            if matches!(inner.state, State::NotStarted | State::Running) {
                inner.state = State::Cancelled;
            }
        }
        self.token.cancel();
    }

    pub fn was_cancelled_externally(&self) -> bool {
        self.lock().externally_cancelled
    }

    /// The first failure recorded, if any.
    pub fn first_failure(&self) -> Option<Failure> {
        self.lock().failure.clone()
    }

    /// Register a task launch.
    pub(crate) fn launch(&self) -> Result<(), LifetimeClosed> {
        if self.token.is_cancelled() {
            return Err(LifetimeClosed);
        }
        let mut inner = self.lock();
        if inner.state == State::NotStarted {
            inner.state = State::Running;
        }
        Ok(())
    }

    /// Record a task failure and cancel the lifetime.
    ///
    /// Returns `true` when this is the first failure, i.e. the one that
    /// becomes the supervisor's result. Errors raised after an external
    /// cancellation are fallout of the stop and never recorded.
    pub(crate) fn fail(&self, task: &'static str, error: &dyn std::fmt::Display) -> bool {
        let first = {
            let mut inner = self.lock();
            if inner.failure.is_some() || inner.externally_cancelled {
                false
            } else {
                inner.failure = Some(Failure {
                    task,
                    message: error.to_string(),
                });
                if inner.state == State::Running || inner.state == State::NotStarted {
                    inner.state = State::Failed;
                }
                true
            }
        };
        self.token.cancel();
        first
    }

    /// Cancel so that background tasks wind down, without marking the
    /// lifetime as externally cancelled.
    pub(crate) fn wind_down(&self) {
        self.token.cancel();
    }

    /// Called once every task has returned.
    pub(crate) fn finish(&self) -> State {
        let mut inner = self.lock();
        if inner.state == State::Running {
            inner.state = State::Completed;
        }
        inner.state
    }
}

impl Default for Lifetime {
    fn default() -> Self {
        Self::new()
    }
}
