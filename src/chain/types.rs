//! Chain-specific types and error definitions.

use alloy::primitives::{Address, Bytes, TxHash, U256};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while talking to the ledger.
#[derive(Debug, Error)]
pub enum ChainError {
    /// RPC connection or request failed.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// The node refused the signed transaction.
    #[error("Broadcast failed: {0}")]
    Broadcast(String),

    /// No receipt arrived within the settlement bound.
    #[error("Transaction {tx_hash} not settled after {waited:?}")]
    SettlementTimeout { tx_hash: TxHash, waited: Duration },

    /// Transaction was mined with status 0.
    #[error("Transaction reverted on-chain: {tx_hash}")]
    Reverted { tx_hash: TxHash },

    /// Transaction signing failed.
    #[error("Signing failed: {0}")]
    Signing(String),

    /// Invalid private key format or missing key.
    #[error("Wallet error: {0}")]
    Wallet(String),

    /// Gas price exceeded maximum allowed.
    #[error("Gas price {current_gwei} gwei exceeds maximum {max_gwei} gwei")]
    GasPriceTooHigh { current_gwei: u64, max_gwei: u64 },

    /// Chain configuration mismatch.
    #[error("Chain ID mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },

    /// The wait was cancelled by the caller. A broadcast transaction stays pending.
    #[error("Cancelled while waiting for {}", .tx_hash.map(|h| h.to_string()).unwrap_or_else(|| "broadcast".to_string()))]
    Cancelled { tx_hash: Option<TxHash> },
}

/// Result type for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;

/// A fully specified transaction, ready to be signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionDraft {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub nonce: u64,
    pub gas_limit: u64,
    pub gas_price: u128,
    pub chain_id: u64,
}

/// A signed, EIP-2718 encoded transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    /// Hash the node will report once the transaction is accepted.
    pub hash: TxHash,
    /// Encoded bytes for `eth_sendRawTransaction`.
    pub raw: Bytes,
    /// Nonce the transaction was signed with.
    pub nonce: u64,
}

/// Settlement record for a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub transaction_hash: TxHash,
    /// 1 on success, 0 on revert.
    pub status: u8,
    pub block_number: Option<u64>,
    pub gas_used: u64,
}

impl Receipt {
    /// Whether the transaction executed without reverting.
    pub fn is_success(&self) -> bool {
        self.status == 1
    }
}

impl From<&alloy::rpc::types::TransactionReceipt> for Receipt {
    fn from(receipt: &alloy::rpc::types::TransactionReceipt) -> Self {
        Self {
            transaction_hash: receipt.transaction_hash,
            status: u8::from(receipt.status()),
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
        }
    }
}
