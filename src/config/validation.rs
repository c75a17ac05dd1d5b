//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Detect duplicate module slugs and role ids
//! - Validate value ranges (timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>

use std::collections::HashSet;
use std::net::SocketAddr;

use crate::config::schema::ServerConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("invalid socket address '{}'", config.listener.bind_address),
        ));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::new("listener.max_body_bytes", "must be greater than 0"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    if matches!(&config.admin.api_key, Some(key) if key.trim().is_empty()) {
        errors.push(ValidationError::new("admin.api_key", "must not be empty when set"));
    }

    let obs = &config.observability;
    if !matches!(obs.log_format.as_str(), "pretty" | "json") {
        errors.push(ValidationError::new(
            "observability.log_format",
            format!("unknown format '{}', expected pretty or json", obs.log_format),
        ));
    }
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address '{}'", obs.metrics_address),
        ));
    }

    let mut slugs = HashSet::new();
    for (i, module) in config.modules.iter().enumerate() {
        if module.slug.is_empty() {
            errors.push(ValidationError::new(format!("modules[{}].slug", i), "must not be empty"));
        } else if !slugs.insert(module.slug.as_str()) {
            errors.push(ValidationError::new(
                format!("modules[{}].slug", i),
                format!("duplicate module '{}'", module.slug),
            ));
        }
    }

    let mut roles = HashSet::new();
    for (i, role) in config.roles.iter().enumerate() {
        if role.id.is_empty() {
            errors.push(ValidationError::new(format!("roles[{}].id", i), "must not be empty"));
        } else if !roles.insert(role.id.as_str()) {
            errors.push(ValidationError::new(
                format!("roles[{}].id", i),
                format!("duplicate role '{}'", role.id),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
