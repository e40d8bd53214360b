//! Signing key management and transaction signing.
//!
//! # Security
//! - Private keys are loaded ONLY from environment variables or explicit arguments
//! - Keys are never logged or serialized

use alloy::consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::primitives::{Address, TxKind, B256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;

use crate::chain::types::{ChainError, ChainResult, SignedTransaction, TransactionDraft};

/// Environment variable name for the private key.
pub const PRIVATE_KEY_ENV_VAR: &str = "REAP_AGENT_PRIVATE_KEY";

/// Local signing wallet for a single account.
#[derive(Debug, Clone)]
pub struct Wallet {
    signer: PrivateKeySigner,
}

impl Wallet {
    /// Create a wallet from a hex-encoded private key string (with or without 0x prefix).
    pub fn from_private_key(private_key_hex: &str) -> ChainResult<Self> {
        let key_hex = private_key_hex.strip_prefix("0x").unwrap_or(private_key_hex);

        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| ChainError::Wallet(format!("Invalid private key format: {}", e)))?;

        tracing::info!(address = %signer.address(), "Wallet initialized");

        Ok(Self { signer })
    }

    /// Load wallet from `REAP_AGENT_PRIVATE_KEY`.
    pub fn from_env() -> ChainResult<Self> {
        let private_key = std::env::var(PRIVATE_KEY_ENV_VAR).map_err(|_| {
            ChainError::Wallet(format!(
                "Environment variable {} not set",
                PRIVATE_KEY_ENV_VAR
            ))
        })?;

        Self::from_private_key(&private_key)
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Sign a 32-byte hash.
    pub async fn sign_hash(&self, hash: B256) -> ChainResult<alloy::signers::Signature> {
        self.signer
            .sign_hash(&hash)
            .await
            .map_err(|e| ChainError::Signing(e.to_string()))
    }

    /// Sign a draft as an EIP-155 legacy transaction.
    pub async fn sign_draft(&self, draft: TransactionDraft) -> ChainResult<SignedTransaction> {
        let nonce = draft.nonce;
        let tx = TxLegacy {
            chain_id: Some(draft.chain_id),
            nonce,
            gas_price: draft.gas_price,
            gas_limit: draft.gas_limit,
            to: TxKind::Call(draft.to),
            value: draft.value,
            input: draft.data,
        };

        let signature = self.sign_hash(tx.signature_hash()).await?;
        let envelope = TxEnvelope::from(tx.into_signed(signature));

        Ok(SignedTransaction {
            hash: *envelope.tx_hash(),
            raw: envelope.encoded_2718().into(),
            nonce,
        })
    }
}
