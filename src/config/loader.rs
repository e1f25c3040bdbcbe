//! Configuration loading from disk and the command line.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::cli::Overrides;
use crate::config::schema::Settings;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("error finding home directory of user")]
    HomeDirectory,

    #[error("IO error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error in {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// `$HOME/.torq/torq.conf`.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let home = std::env::var_os("HOME").ok_or(ConfigError::HomeDirectory)?;
    Ok(PathBuf::from(home).join(".torq").join("torq.conf"))
}

/// Load configuration from a TOML file without validating it.
///
/// A file that does not exist yields the defaults.
pub fn load_file(path: &Path) -> Result<Settings, ConfigError> {
    if !path.exists() {
        tracing::debug!(path = ?path, "Config file not found, using defaults");
        return Ok(Settings::default());
    }

    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolve the final configuration: defaults, then the config file, then
/// explicit flags. The result is validated and never mutated afterwards.
pub fn resolve(overrides: &Overrides) -> Result<Settings, ConfigError> {
    let path = match &overrides.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };

    let mut settings = load_file(&path)?;
    overrides.apply(&mut settings);

    validate_config(&settings).map_err(ConfigError::Validation)?;

    Ok(settings)
}
