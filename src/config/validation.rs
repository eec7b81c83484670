//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check the reserved administrative prefix is a usable path prefix
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system (startup and hot reload)

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ProxyConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: '{value}' is not a socket address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),

    #[error("disraptor.reserved_prefix '{0}' must start with '/' and not end with '/'")]
    InvalidReservedPrefix(String),
}

pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    let disraptor = &config.disraptor;
    if disraptor.read_timeout_secs == 0 {
        errors.push(ValidationError::ZeroValue("disraptor.read_timeout_secs"));
    }
    if disraptor.connect_timeout_secs == 0 {
        errors.push(ValidationError::ZeroValue("disraptor.connect_timeout_secs"));
    }
    if disraptor.max_body_bytes == 0 {
        errors.push(ValidationError::ZeroValue("disraptor.max_body_bytes"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroValue("timeouts.request_secs"));
    }

    let prefix = &disraptor.reserved_prefix;
    if !prefix.starts_with('/') || prefix.len() < 2 || prefix.ends_with('/') {
        errors.push(ValidationError::InvalidReservedPrefix(prefix.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
