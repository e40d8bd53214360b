//! Configuration validation.
//!
//! Semantic checks only; serde handles the syntax. All errors are collected rather than
//! stopping at the first one.

use alloy::primitives::Address;
use std::fmt;

use crate::config::schema::AgentConfig;

/// Lowest gas limit the chain accepts for any transaction.
const MIN_GAS_LIMIT: u64 = 21_000;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field, e.g. "chain.rpc_url".
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn check_url(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    match url::Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => errors.push(ValidationError {
            field,
            message: format!("unsupported scheme '{}'", url.scheme()),
        }),
        Err(e) => errors.push(ValidationError {
            field,
            message: format!("invalid URL '{}': {}", value, e),
        }),
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &AgentConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_url(&mut errors, "chain.rpc_url", &config.chain.rpc_url);
    for url in &config.chain.failover_urls {
        check_url(&mut errors, "chain.failover_urls", url);
    }
    if config.chain.rpc_timeout_secs == 0 {
        errors.push(ValidationError {
            field: "chain.rpc_timeout_secs",
            message: "must be greater than zero".to_string(),
        });
    }
    if config.chain.receipt_poll_interval_ms > config.chain.receipt_poll_max_interval_ms {
        errors.push(ValidationError {
            field: "chain.receipt_poll_interval_ms",
            message: "must not exceed receipt_poll_max_interval_ms".to_string(),
        });
    }

    check_url(&mut errors, "builder.base_url", &config.builder.base_url);
    if config.builder.timeout_secs == 0 {
        errors.push(ValidationError {
            field: "builder.timeout_secs",
            message: "must be greater than zero".to_string(),
        });
    }

    if config.execution.gas_limit < MIN_GAS_LIMIT {
        errors.push(ValidationError {
            field: "execution.gas_limit",
            message: format!("must be at least {}", MIN_GAS_LIMIT),
        });
    }
    let multiplier = config.execution.gas_price_multiplier;
    if !multiplier.is_finite() || multiplier < 1.0 {
        errors.push(ValidationError {
            field: "execution.gas_price_multiplier",
            message: format!("must be a finite value >= 1.0, got {}", multiplier),
        });
    }

    if config.holocron.router_address.parse::<Address>().is_err() {
        errors.push(ValidationError {
            field: "holocron.router_address",
            message: format!("invalid address '{}'", config.holocron.router_address),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
