//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, limits ordered, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BinConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::BinConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("http.default_history_limit ({default}) exceeds http.max_history_limit ({max})")]
    HistoryLimitOrder { default: usize, max: usize },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &BinConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    let positive = [
        ("timeouts.request_secs", config.timeouts.request_secs as usize),
        ("store.timeout_ms", config.store.timeout_ms as usize),
        ("stream.heartbeat_secs", config.stream.heartbeat_secs as usize),
        ("stream.buffer_capacity", config.stream.buffer_capacity),
        ("http.default_history_limit", config.http.default_history_limit),
        ("http.max_history_limit", config.http.max_history_limit),
        ("http.max_body_size", config.http.max_body_size),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    if config.http.default_history_limit > config.http.max_history_limit {
        errors.push(ValidationError::HistoryLimitOrder {
            default: config.http.default_history_limit,
            max: config.http.max_history_limit,
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}
