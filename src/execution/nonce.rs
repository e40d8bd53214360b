//! Per-batch nonce bookkeeping.

use alloy::primitives::Address;

use crate::chain::gateway::ChainGateway;
use crate::chain::types::ChainResult;

/// Monotonic nonce counter for one account over one batch execution.
///
/// The counter only moves forward after a transaction settles with a success status. A
/// reverted transaction still consumes its nonce on-chain, so after a revert the counter
/// lags the account's true nonce until the next batch re-reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonceSequencer {
    initial: u64,
    current: u64,
}

impl NonceSequencer {
    /// Start a sequence at the account's pending nonce.
    pub async fn initialize(gateway: &dyn ChainGateway, address: Address) -> ChainResult<Self> {
        let nonce = gateway.pending_nonce(address).await?;
        tracing::debug!(address = %address, nonce, "Nonce sequence initialized");
        Ok(Self::starting_at(nonce))
    }

    pub fn starting_at(nonce: u64) -> Self {
        Self {
            initial: nonce,
            current: nonce,
        }
    }

    /// Nonce for the next broadcast.
    pub fn current(&self) -> u64 {
        self.current
    }

    /// Nonce the sequence started from.
    pub fn initial(&self) -> u64 {
        self.initial
    }

    /// Number of settled transactions so far.
    pub fn settled(&self) -> u64 {
        self.current - self.initial
    }

    /// Move past a settled transaction. Only the executor calls this.
    pub(crate) fn advance(&mut self) {
        self.current += 1;
    }
}
