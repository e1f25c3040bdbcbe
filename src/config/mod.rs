//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! built-in defaults (schema.rs)
//!     → config file, if present (loader.rs, TOML)
//!     → explicit command-line flags (cli.rs)
//!     → validation.rs (semantic checks)
//!     → Settings (validated, immutable)
//!     → passed by reference to every component
//! ```
//!
//! # Design Decisions
//! - Settings are resolved once, before any connection attempt
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod cli;
pub mod loader;
pub mod schema;
pub mod validation;

pub use cli::{Cli, Command, Overrides};
pub use loader::{resolve, ConfigError};
pub use schema::{
    DatabaseSettings, EventStream, IngestSettings, LifecycleSettings, NodeSettings,
    ObservabilitySettings, ServerSettings, Settings,
};
