//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (ports valid, backoff bounds ordered)
//! - Reject settings that would make a connection attempt meaningless
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: Settings → Result<(), Vec<ValidationError>>
//! - Node credential paths are checked when connecting, not here, so that
//!   `migrate_up` works without them

use thiserror::Error;

use crate::config::schema::Settings;

/// A single rejected setting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub fn validate_config(settings: &Settings) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if settings.db.name.is_empty() {
        errors.push(ValidationError::new("db.name", "must not be empty"));
    }
    if settings.db.host.is_empty() {
        errors.push(ValidationError::new("db.host", "must not be empty"));
    }
    if settings.db.port == 0 {
        errors.push(ValidationError::new("db.port", "must be a valid port"));
    }
    if settings.db.max_connections == 0 {
        errors.push(ValidationError::new("db.max_connections", "must be at least 1"));
    }
    if settings.lnd.node_address.is_empty() {
        errors.push(ValidationError::new("lnd.node_address", "must not be empty"));
    }
    if settings.torq.port == 0 {
        errors.push(ValidationError::new("torq.port", "must be a valid port"));
    }
    if settings.ingest.streams.is_empty() {
        errors.push(ValidationError::new("ingest.streams", "at least one stream is required"));
    }
    if settings.ingest.base_delay_ms > settings.ingest.max_delay_ms {
        errors.push(ValidationError::new(
            "ingest.base_delay_ms",
            format!(
                "must not exceed ingest.max_delay_ms ({})",
                settings.ingest.max_delay_ms
            ),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
