//! Umbrella error for the high-level agent API.

use thiserror::Error;

use crate::builder::BuilderError;
use crate::chain::ChainError;
use crate::execution::ExecutionError;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Builder(#[from] BuilderError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    /// A caller-supplied argument or config value could not be used.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type AgentResult<T> = Result<T, AgentError>;
