//! Top-level error returned by every command.

use thiserror::Error;

use crate::commands::call::CallError;
use crate::config::ConfigError;
use crate::lifecycle::{ShutdownError, StartupError, SupervisorError};

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Startup(#[from] StartupError),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error(transparent)]
    Shutdown(#[from] ShutdownError),

    #[error(transparent)]
    Call(#[from] CallError),
}

impl RunError {
    /// The run was stopped by a signal rather than by a failure.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, RunError::Supervisor(SupervisorError::Cancelled))
    }
}
