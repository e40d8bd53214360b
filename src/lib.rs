//! Reap protocol agent client.
//!
//! Turns builder-supplied transaction intents into settled on-chain state and pays
//! x402 challenges transparently while fetching protected resources.

pub mod agent;
pub mod builder;
pub mod chain;
pub mod config;
pub mod error;
pub mod execution;
pub mod holocron;
pub mod observability;
pub mod resilience;
pub mod x402;

pub use agent::{ReapAgent, StockOutcome, SyncOutcome};
pub use config::AgentConfig;
pub use error::{AgentError, AgentResult};
pub use execution::{TransactionExecutor, TransactionIntent};
pub use x402::PaymentNegotiator;
