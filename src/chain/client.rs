//! JSON-RPC backed [`ChainGateway`] with timeouts and provider failover.
//!
//! # Responsibilities
//! - Connect to the primary JSON-RPC endpoint plus optional failovers
//! - Query account and chain state (pending nonce, gas price, chain id)
//! - Sign with the local [`Wallet`] and broadcast raw transactions
//! - Poll for receipts until one appears

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, TxHash};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::transports::TransportResult;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};

use crate::chain::gateway::ChainGateway;
use crate::chain::types::{ChainError, ChainResult, Receipt, SignedTransaction, TransactionDraft};
use crate::chain::wallet::Wallet;
use crate::config::schema::ChainConfig;
use crate::resilience::backoff::calculate_backoff;

type DynProvider = Arc<dyn Provider + Send + Sync>;

/// Gateway over one or more HTTP providers for a single signing account.
#[derive(Clone)]
pub struct RpcGateway {
    /// Primary provider first, then failovers.
    providers: Vec<DynProvider>,
    wallet: Wallet,
    config: ChainConfig,
    timeout_duration: Duration,
}

impl RpcGateway {
    /// Create a gateway and check the remote chain id against `expected_chain_id`.
    ///
    /// A chain id mismatch or an unreachable node is logged, not returned, so the agent can
    /// still start and fail on first use.
    pub async fn new(config: ChainConfig, wallet: Wallet) -> ChainResult<Self> {
        let timeout_duration = Duration::from_secs(config.rpc_timeout_secs);
        let mut providers = Vec::new();

        let primary_url: url::Url = config.rpc_url.parse().map_err(|e| {
            ChainError::Rpc(format!("Invalid RPC URL '{}': {}", config.rpc_url, e))
        })?;
        providers.push(Arc::new(ProviderBuilder::new().connect_http(primary_url)) as DynProvider);

        for url_str in &config.failover_urls {
            if let Ok(url) = url_str.parse() {
                providers.push(Arc::new(ProviderBuilder::new().connect_http(url)) as DynProvider);
            } else {
                tracing::warn!(url = %url_str, "Ignoring invalid failover RPC URL");
            }
        }

        let gateway = Self {
            providers,
            wallet,
            config,
            timeout_duration,
        };

        match gateway.verify_chain_id().await {
            Ok(()) => tracing::info!(
                rpc_url = %gateway.config.rpc_url,
                address = %gateway.wallet.address(),
                "Chain gateway initialized"
            ),
            Err(e) => tracing::warn!(
                error = %e,
                "Chain gateway initialized but chain verification failed"
            ),
        }

        Ok(gateway)
    }

    /// Verify the connected chain id matches configuration, if one is configured.
    pub async fn verify_chain_id(&self) -> ChainResult<()> {
        let Some(expected) = self.config.expected_chain_id else {
            return Ok(());
        };
        let actual = self.chain_id().await?;
        if actual != expected {
            return Err(ChainError::ChainMismatch { expected, actual });
        }
        Ok(())
    }

    /// Run `op` against each provider in turn until one answers within the RPC timeout.
    ///
    /// Returns the last error text when every provider fails.
    async fn with_failover<T, F, Fut>(&self, method: &'static str, op: F) -> Result<T, String>
    where
        F: Fn(DynProvider) -> Fut,
        Fut: Future<Output = TransportResult<T>>,
    {
        let mut last_error = String::from("no providers configured");
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, op(provider.clone())).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => {
                    tracing::warn!(provider_idx = i, method, error = %e, "RPC error, trying next provider");
                    last_error = e.to_string();
                }
                Err(_) => {
                    tracing::warn!(provider_idx = i, method, "RPC timeout, trying next provider");
                    last_error = format!("timeout after {}s", self.timeout_duration.as_secs());
                }
            }
        }
        Err(format!("All RPC providers failed {}: {}", method, last_error))
    }

    async fn receipt(&self, tx_hash: TxHash) -> ChainResult<Option<Receipt>> {
        let receipt = self
            .with_failover("eth_getTransactionReceipt", |p| async move {
                p.get_transaction_receipt(tx_hash).await
            })
            .await
            .map_err(ChainError::Rpc)?;
        Ok(receipt.as_ref().map(Receipt::from))
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }
}

#[async_trait]
impl ChainGateway for RpcGateway {
    fn address(&self) -> Address {
        self.wallet.address()
    }

    async fn pending_nonce(&self, address: Address) -> ChainResult<u64> {
        self.with_failover("eth_getTransactionCount", |p| async move {
            p.get_transaction_count(address).pending().await
        })
        .await
        .map_err(ChainError::Rpc)
    }

    async fn gas_price(&self) -> ChainResult<u128> {
        self.with_failover("eth_gasPrice", |p| async move { p.get_gas_price().await })
            .await
            .map_err(ChainError::Rpc)
    }

    async fn chain_id(&self) -> ChainResult<u64> {
        self.with_failover("eth_chainId", |p| async move { p.get_chain_id().await })
            .await
            .map_err(ChainError::Rpc)
    }

    async fn sign(&self, draft: TransactionDraft) -> ChainResult<SignedTransaction> {
        self.wallet.sign_draft(draft).await
    }

    /// Send the raw transaction, falling over to the next provider on failure.
    ///
    /// A provider that timed out may still have taken the transaction, so after a timeout the
    /// local hash is returned unless a node rejects the transaction outright. An `already
    /// known` reply is accepted from any node; `nonce too low` only after a timeout.
    async fn broadcast(&self, tx: &SignedTransaction) -> ChainResult<TxHash> {
        let mut maybe_delivered = false;
        let mut rejection: Option<String> = None;
        let mut last_error = String::from("no providers configured");

        for (i, provider) in self.providers.iter().enumerate() {
            let error = match timeout(self.timeout_duration, provider.send_raw_transaction(&tx.raw))
                .await
            {
                Ok(Ok(pending)) => return Ok(*pending.tx_hash()),
                Ok(Err(e)) => e,
                Err(_) => {
                    tracing::warn!(provider_idx = i, tx_hash = %tx.hash, "Broadcast timeout, trying next provider");
                    maybe_delivered = true;
                    last_error = format!("timeout after {}s", self.timeout_duration.as_secs());
                    continue;
                }
            };

            match error.as_error_resp() {
                Some(payload) => match classify_rejection(&payload.message, maybe_delivered) {
                    BroadcastRejection::AlreadyHeld => {
                        tracing::info!(
                            provider_idx = i,
                            tx_hash = %tx.hash,
                            reply = %payload.message,
                            "Node already holds the transaction"
                        );
                        return Ok(tx.hash);
                    }
                    BroadcastRejection::Refused => {
                        tracing::warn!(provider_idx = i, error = %error, "Node rejected transaction");
                        rejection = Some(error.to_string());
                    }
                },
                None => {
                    tracing::warn!(provider_idx = i, error = %error, "Broadcast error, trying next provider");
                    last_error = error.to_string();
                }
            }
        }

        if let Some(reason) = rejection {
            return Err(ChainError::Broadcast(reason));
        }
        if maybe_delivered {
            tracing::warn!(tx_hash = %tx.hash, "Broadcast unconfirmed, leaving it to settlement");
            return Ok(tx.hash);
        }
        Err(ChainError::Broadcast(format!(
            "All RPC providers failed eth_sendRawTransaction: {}",
            last_error
        )))
    }

    async fn wait_for_receipt(&self, tx_hash: TxHash) -> ChainResult<Receipt> {
        let mut attempt: u32 = 0;
        loop {
            match self.receipt(tx_hash).await {
                Ok(Some(receipt)) => return Ok(receipt),
                Ok(None) => tracing::debug!(tx_hash = %tx_hash, attempt, "Transaction pending"),
                Err(e) => tracing::warn!(tx_hash = %tx_hash, error = %e, "Receipt poll failed"),
            }

            attempt = attempt.saturating_add(1);
            sleep(calculate_backoff(
                attempt,
                self.config.receipt_poll_interval_ms,
                self.config.receipt_poll_max_interval_ms,
            ))
            .await;
        }
    }

    async fn call(&self, to: Address, data: Bytes) -> ChainResult<Bytes> {
        let request = TransactionRequest::default().with_to(to).with_input(data);
        self.with_failover("eth_call", |p| {
            let request = request.clone();
            async move { p.call(request).await }
        })
        .await
        .map_err(ChainError::Rpc)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BroadcastRejection {
    /// The node has (or had) this exact transaction.
    AlreadyHeld,
    Refused,
}

fn classify_rejection(message: &str, after_timeout: bool) -> BroadcastRejection {
    let message = message.to_ascii_lowercase();
    let held = ["already known", "known transaction", "already imported"]
        .iter()
        .any(|marker| message.contains(marker));
    if held || (after_timeout && message.contains("nonce too low")) {
        BroadcastRejection::AlreadyHeld
    } else {
        BroadcastRejection::Refused
    }
}

impl std::fmt::Debug for RpcGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcGateway")
            .field("rpc_url", &self.config.rpc_url)
            .field("providers", &self.providers.len())
            .field("address", &self.wallet.address())
            .finish()
    }
}
