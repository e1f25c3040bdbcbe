//! Shutdown coordination: releasing acquired resources.
//!
//! # Responsibilities
//! - Remember every acquired resource together with its release operation
//! - Release in reverse acquisition order on every exit path
//! - Keep the first error of the run as the reported result
//!
//! # Design Decisions
//! - Release errors never mask an earlier error; they are logged instead
//! - With no earlier error, the first release failure (in release order)
//!   becomes the result

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::future::Future;
use thiserror::Error;

use crate::backend::BackendError;

/// Failure to release one resource.
#[derive(Debug, Error)]
#[error("failed to release {resource}: {source}")]
pub struct ShutdownError {
    pub resource: &'static str,
    #[source]
    pub source: BackendError,
}

type Release = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), BackendError>> + Send>;

/// Reverse-order resource releaser.
#[derive(Default)]
pub struct ShutdownCoordinator {
    resources: Vec<(&'static str, Release)>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a just-acquired resource.
    pub fn push<F, Fut>(&mut self, resource: &'static str, release: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BackendError>> + Send + 'static,
    {
        tracing::debug!(resource, "Resource acquired");
        self.resources
            .push((resource, Box::new(move || release().boxed())));
    }

    /// Number of resources still held.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Release everything, last acquired first, and fold release failures
    /// into `primary` without ever replacing an existing error.
    pub async fn close<T, E>(mut self, primary: Result<T, E>) -> Result<T, E>
    where
        E: From<ShutdownError> + std::fmt::Display,
    {
        let mut result = primary;

        while let Some((resource, release)) = self.resources.pop() {
            match release().await {
                Ok(()) => tracing::info!(resource, "Resource released"),
                Err(source) => {
                    let error = ShutdownError { resource, source };
                    match &result {
                        Ok(_) => {
                            tracing::error!(error = %error, "Release failed");
                            result = Err(E::from(error));
                        }
                        Err(primary) => {
                            tracing::warn!(
                                error = %error,
                                primary = %primary,
                                "Release failed, keeping the earlier error"
                            );
                        }
                    }
                }
            }
        }

        result
    }
}

impl std::fmt::Debug for ShutdownCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.resources.iter().map(|(name, _)| *name).collect();
        f.debug_struct("ShutdownCoordinator")
            .field("resources", &names)
            .finish()
    }
}
