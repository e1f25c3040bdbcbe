//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Open database → Migrate → Connect node   (each registered for release)
//!
//! Supervision (supervisor.rs, lifetime.rs):
//!     Launch tasks under one Lifetime → first failure cancels it → join
//!
//! Shutdown (shutdown.rs):
//!     Release node → Release database, first error of the run wins
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → cancel the Lifetime
//! ```
//!
//! # Design Decisions
//! - Ordered startup: database first, node last, tasks only after both
//! - Ordered shutdown: reverse acquisition order
//! - Shutdown has a grace period: tasks still running after it are aborted

pub mod lifetime;
pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod supervisor;

pub use lifetime::{Failure, Lifetime, LifetimeClosed, State};
pub use shutdown::{ShutdownCoordinator, ShutdownError};
pub use startup::{Dependencies, StartupError};
pub use supervisor::{Mode, Supervisor, SupervisorError, Task, TaskError};
