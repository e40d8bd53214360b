//! The ledger seam consumed by the execution engine.

use alloy::primitives::{Address, Bytes, TxHash};
use async_trait::async_trait;

use crate::chain::types::{ChainResult, Receipt, SignedTransaction, TransactionDraft};

/// Account-bound access to one chain.
///
/// Implementations own the signing key for [`ChainGateway::address`]. The executor only ever
/// hands over drafts and never sees key material.
#[async_trait]
pub trait ChainGateway: Send + Sync {
    /// Address of the signing account.
    fn address(&self) -> Address;

    /// Next nonce for `address`, counting transactions still in the mempool.
    async fn pending_nonce(&self, address: Address) -> ChainResult<u64>;

    /// Current gas price in wei.
    async fn gas_price(&self) -> ChainResult<u128>;

    async fn chain_id(&self) -> ChainResult<u64>;

    async fn sign(&self, draft: TransactionDraft) -> ChainResult<SignedTransaction>;

    async fn broadcast(&self, tx: &SignedTransaction) -> ChainResult<TxHash>;

    /// Block until a receipt for `tx_hash` exists. Callers are expected to bound this.
    async fn wait_for_receipt(&self, tx_hash: TxHash) -> ChainResult<Receipt>;

    /// Read-only contract call (`eth_call`) against the latest block.
    async fn call(&self, to: Address, data: Bytes) -> ChainResult<Bytes>;
}
