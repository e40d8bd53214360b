//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::AgentConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Overrides `chain.rpc_url`.
pub const RPC_URL_ENV_VAR: &str = "REAP_AGENT_RPC_URL";
/// Overrides `builder.base_url`.
pub const BUILDER_URL_ENV_VAR: &str = "REAP_AGENT_BUILDER_URL";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration from an optional TOML file, apply environment overrides, then validate.
///
/// Without a path the defaults are used.
pub fn load_config(path: Option<&Path>) -> Result<AgentConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => AgentConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply `REAP_AGENT_*` overrides using `lookup` to read variables.
pub fn apply_env_overrides<F>(config: &mut AgentConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(rpc_url) = lookup(RPC_URL_ENV_VAR) {
        config.chain.rpc_url = rpc_url;
    }
    if let Some(builder_url) = lookup(BUILDER_URL_ENV_VAR) {
        config.builder.base_url = builder_url;
    }
}
