//! Ledger integration subsystem.
//!
//! # Data Flow
//! ```text
//! REAP_AGENT_PRIVATE_KEY
//!     → wallet.rs (key loading, EIP-155 signing)
//!     → client.rs (RpcGateway: RPC with timeouts and failover)
//!     → gateway.rs (ChainGateway trait consumed by the executor)
//! ```
//!
//! # Security Constraints
//! - Private keys ONLY from environment variables
//! - Never log private keys or sensitive data
//! - All RPC calls have configurable timeouts

pub mod client;
pub mod gateway;
pub mod types;
pub mod wallet;

pub use client::RpcGateway;
pub use gateway::ChainGateway;
pub use types::{ChainError, ChainResult, Receipt, SignedTransaction, TransactionDraft};
pub use wallet::Wallet;
