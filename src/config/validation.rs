//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (windows > 0, thresholds ordered)
//! - Check dependency endpoints and header values
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatekeeperConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use axum::http::{HeaderName, HeaderValue};
use thiserror::Error;

use crate::config::schema::GatekeeperConfig;
use crate::observability::logging::LogLevel;

const MAX_TOKEN_BYTES: usize = 256;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
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

/// Validate a configuration, collecting every violation.
pub fn validate_config(config: &GatekeeperConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.observability.log_level.parse::<LogLevel>().is_err() {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level '{}'", config.observability.log_level),
        ));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "must be a socket address",
        ));
    }

    let rl = &config.rate_limit;
    if rl.max_attempts == 0 {
        errors.push(ValidationError::new("rate_limit.max_attempts", "must be greater than 0"));
    }
    if rl.window_ms == 0 {
        errors.push(ValidationError::new("rate_limit.window_ms", "must be greater than 0"));
    }
    if rl.block_duration_ms == 0 {
        errors.push(ValidationError::new("rate_limit.block_duration_ms", "must be greater than 0"));
    }
    if rl.cleanup_interval_secs == 0 {
        errors.push(ValidationError::new("rate_limit.cleanup_interval_secs", "must be greater than 0"));
    }

    let csrf = &config.csrf;
    if csrf.token_bytes == 0 || csrf.token_bytes > MAX_TOKEN_BYTES {
        errors.push(ValidationError::new(
            "csrf.token_bytes",
            format!("must be between 1 and {}", MAX_TOKEN_BYTES),
        ));
    }
    if HeaderName::try_from(csrf.header_name.as_str()).is_err() {
        errors.push(ValidationError::new("csrf.header_name", "not a valid header name"));
    }
    if csrf.session_key.is_empty() {
        errors.push(ValidationError::new("csrf.session_key", "must not be empty"));
    }

    let health = &config.health;
    if health.interval_ms == 0 {
        errors.push(ValidationError::new("health.interval_ms", "must be greater than 0"));
    }
    if health.probe_timeout_ms == 0 {
        errors.push(ValidationError::new("health.probe_timeout_ms", "must be greater than 0"));
    } else if health.probe_timeout_ms >= health.interval_ms {
        errors.push(ValidationError::new(
            "health.probe_timeout_ms",
            "must be shorter than health.interval_ms",
        ));
    }
    if health.response_time_warn_ms >= health.response_time_critical_ms {
        errors.push(ValidationError::new(
            "health.response_time_warn_ms",
            "must be below health.response_time_critical_ms",
        ));
    }
    for (field, rate) in [
        ("health.error_rate_warn", health.error_rate_warn),
        ("health.error_rate_critical", health.error_rate_critical),
    ] {
        if !(0.0..=1.0).contains(&rate) {
            errors.push(ValidationError::new(field, "must be within [0, 1]"));
        }
    }
    if health.error_rate_warn >= health.error_rate_critical {
        errors.push(ValidationError::new(
            "health.error_rate_warn",
            "must be below health.error_rate_critical",
        ));
    }

    let mut names = HashSet::new();
    for (i, dep) in health.dependencies.iter().enumerate() {
        let field = format!("health.dependencies[{}]", i);
        if dep.name.is_empty() {
            errors.push(ValidationError::new(&field, "name must not be empty"));
        } else if !names.insert(dep.name.as_str()) {
            errors.push(ValidationError::new(&field, format!("duplicate name '{}'", dep.name)));
        }
        match url::Url::parse(&dep.url) {
            Ok(u) if matches!(u.scheme(), "http" | "https") => {}
            Ok(u) => errors.push(ValidationError::new(
                &field,
                format!("unsupported scheme '{}'", u.scheme()),
            )),
            Err(e) => errors.push(ValidationError::new(&field, format!("invalid url: {}", e))),
        }
    }

    let headers = &config.security_headers;
    for (field, value) in [
        ("security_headers.content_security_policy", &headers.content_security_policy),
        ("security_headers.permissions_policy", &headers.permissions_policy),
    ] {
        if HeaderValue::from_str(value).is_err() {
            errors.push(ValidationError::new(field, "not a valid header value"));
        }
    }

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new("server.bind_address", "must be a socket address"));
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::new("server.request_timeout_secs", "must be greater than 0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
