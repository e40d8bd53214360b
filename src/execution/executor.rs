//! Ordered execution of a transaction batch.
//!
//! Each intent is signed, broadcast and settled before the next one starts; every intent
//! depends on the nonce left behind by its predecessor. A failed attempt is classified by
//! the intent's [`Criticality`]: critical failures abort the batch, best-effort failures are
//! logged and skipped without advancing the nonce.

use alloy::primitives::TxHash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::chain::gateway::ChainGateway;
use crate::chain::types::{ChainError, ChainResult, Receipt, SignedTransaction, TransactionDraft};
use crate::config::schema::ExecutionConfig;
use crate::execution::intent::{Criticality, TransactionIntent};
use crate::execution::nonce::NonceSequencer;
use crate::observability::metrics;

const WEI_PER_GWEI: u128 = 1_000_000_000;

/// Errors that end a batch early.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// Account or chain state could not be read before the first intent.
    #[error("Batch setup failed: {0}")]
    Setup(#[source] ChainError),

    /// An intent failed in a way the batch cannot recover from.
    ///
    /// Displayed positions count from 1, like unlabeled intents' `Tx N` names.
    #[error("{} intent #{} '{}' failed: {}", .criticality, .index + 1, .label, .source)]
    Intent {
        /// Zero-based position in the batch.
        index: usize,
        label: String,
        criticality: Criticality,
        source: ChainError,
    },
}

impl ExecutionError {
    /// Label of the intent that stopped the batch, if any.
    pub fn label(&self) -> Option<&str> {
        match self {
            ExecutionError::Setup(_) => None,
            ExecutionError::Intent { label, .. } => Some(label),
        }
    }
}

/// Result type for batch execution.
pub type ExecutionResult<T> = Result<T, ExecutionError>;

/// Outcome of a single intent attempt.
#[derive(Debug)]
pub enum IntentOutcome {
    Settled(Receipt),
    /// Best-effort failure; the batch continues.
    Skipped(ChainError),
    /// The batch must stop.
    Fatal(ChainError),
}

impl IntentOutcome {
    /// Fold a settlement result into an outcome under the given criticality.
    ///
    /// Cancellation is always fatal: the caller asked for the batch to stop.
    pub fn classify(criticality: Criticality, result: ChainResult<Receipt>) -> Self {
        match result {
            Ok(receipt) => IntentOutcome::Settled(receipt),
            Err(e @ ChainError::Cancelled { .. }) => IntentOutcome::Fatal(e),
            Err(e) => match criticality {
                Criticality::Critical => IntentOutcome::Fatal(e),
                Criticality::BestEffort => IntentOutcome::Skipped(e),
            },
        }
    }
}

/// A best-effort intent that did not settle.
#[derive(Debug)]
pub struct SkippedIntent {
    pub index: usize,
    pub label: String,
    pub reason: ChainError,
}

/// Everything a batch produced.
#[derive(Debug)]
pub struct BatchReport {
    /// Correlation id used in the batch's tracing span.
    pub batch_id: Uuid,
    /// Settled receipts, in intent order.
    pub receipts: Vec<Receipt>,
    pub skipped: Vec<SkippedIntent>,
    /// Pending nonce read at batch start.
    pub initial_nonce: u64,
    /// Sequencer position after the batch.
    pub next_nonce: u64,
}

impl BatchReport {
    pub fn last_receipt(&self) -> Option<&Receipt> {
        self.receipts.last()
    }

    pub fn into_last_receipt(self) -> Option<Receipt> {
        self.receipts.into_iter().last()
    }
}

/// Gas and settlement policy applied to every intent.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionSettings {
    /// Gas limit for intents without an override.
    pub gas_limit: u64,
    pub gas_price_multiplier: f64,
    pub max_gas_price_gwei: u64,
    /// `None` waits for settlement indefinitely.
    pub settlement_timeout: Option<Duration>,
}

impl ExecutionSettings {
    /// Apply the ceiling and multiplier to a node-reported gas price.
    pub fn adjust_gas_price(&self, gas_price: u128) -> ChainResult<u128> {
        let gas_price_gwei = gas_price / WEI_PER_GWEI;
        if gas_price_gwei > self.max_gas_price_gwei as u128 {
            return Err(ChainError::GasPriceTooHigh {
                current_gwei: u64::try_from(gas_price_gwei).unwrap_or(u64::MAX),
                max_gwei: self.max_gas_price_gwei,
            });
        }
        Ok((gas_price as f64 * self.gas_price_multiplier) as u128)
    }
}

impl From<&ExecutionConfig> for ExecutionSettings {
    fn from(config: &ExecutionConfig) -> Self {
        Self {
            gas_limit: config.gas_limit,
            gas_price_multiplier: config.gas_price_multiplier,
            max_gas_price_gwei: config.max_gas_price_gwei,
            settlement_timeout: match config.settlement_timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        }
    }
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self::from(&ExecutionConfig::default())
    }
}

/// Drives intents through a [`ChainGateway`] one at a time.
#[derive(Clone)]
pub struct TransactionExecutor {
    gateway: Arc<dyn ChainGateway>,
    settings: ExecutionSettings,
}

impl TransactionExecutor {
    pub fn new(gateway: Arc<dyn ChainGateway>, settings: ExecutionSettings) -> Self {
        Self { gateway, settings }
    }

    pub fn gateway(&self) -> &Arc<dyn ChainGateway> {
        &self.gateway
    }

    pub fn settings(&self) -> &ExecutionSettings {
        &self.settings
    }

    /// Execute `intents` in order and return the last settled receipt.
    ///
    /// `Ok(None)` means nothing settled; an error means a critical step failed.
    pub async fn execute(&self, intents: &[TransactionIntent]) -> ExecutionResult<Option<Receipt>> {
        let report = self
            .execute_batch(intents, &CancellationToken::new())
            .await?;
        Ok(report.into_last_receipt())
    }

    /// Execute `intents` in order, stopping if `cancel` fires.
    pub async fn execute_batch(
        &self,
        intents: &[TransactionIntent],
        cancel: &CancellationToken,
    ) -> ExecutionResult<BatchReport> {
        let batch_id = Uuid::new_v4();
        let span = tracing::info_span!("batch", %batch_id, intents = intents.len());
        self.run_batch(batch_id, intents, cancel)
            .instrument(span)
            .await
    }

    async fn run_batch(
        &self,
        batch_id: Uuid,
        intents: &[TransactionIntent],
        cancel: &CancellationToken,
    ) -> ExecutionResult<BatchReport> {
        let address = self.gateway.address();
        let mut sequencer = NonceSequencer::initialize(self.gateway.as_ref(), address)
            .await
            .map_err(ExecutionError::Setup)?;
        let chain_id = self.gateway.chain_id().await.map_err(ExecutionError::Setup)?;

        let mut report = BatchReport {
            batch_id,
            receipts: Vec::with_capacity(intents.len()),
            skipped: Vec::new(),
            initial_nonce: sequencer.initial(),
            next_nonce: sequencer.initial(),
        };

        for (index, intent) in intents.iter().enumerate() {
            let label = intent.display_label(index);
            let criticality = intent.criticality();
            let nonce = sequencer.current();
            tracing::info!(index, label = %label, nonce, %criticality, "Signing intent");

            match self.attempt(intent, nonce, chain_id, cancel).await {
                IntentOutcome::Settled(receipt) => {
                    metrics::record_transaction("settled");
                    tracing::info!(
                        label = %label,
                        tx_hash = %receipt.transaction_hash,
                        block_number = ?receipt.block_number,
                        "Settled on-chain"
                    );
                    report.receipts.push(receipt);
                    sequencer.advance();
                }
                IntentOutcome::Skipped(reason) => {
                    metrics::record_transaction("skipped");
                    tracing::warn!(label = %label, error = %reason, "Best-effort intent failed, continuing");
                    report.skipped.push(SkippedIntent {
                        index,
                        label,
                        reason,
                    });
                }
                IntentOutcome::Fatal(reason) => {
                    metrics::record_transaction("fatal");
                    tracing::error!(label = %label, error = %reason, "Intent failed, aborting batch");
                    return Err(ExecutionError::Intent {
                        index,
                        label,
                        criticality,
                        source: reason,
                    });
                }
            }
        }

        report.next_nonce = sequencer.current();
        tracing::info!(
            settled = report.receipts.len(),
            skipped = report.skipped.len(),
            next_nonce = report.next_nonce,
            "Batch complete"
        );
        Ok(report)
    }

    async fn attempt(
        &self,
        intent: &TransactionIntent,
        nonce: u64,
        chain_id: u64,
        cancel: &CancellationToken,
    ) -> IntentOutcome {
        if cancel.is_cancelled() {
            return IntentOutcome::Fatal(ChainError::Cancelled { tx_hash: None });
        }

        // Preparation problems point at the gateway or key, not at this intent.
        let signed = match self.prepare(intent, nonce, chain_id).await {
            Ok(signed) => signed,
            Err(e) => return IntentOutcome::Fatal(e),
        };

        IntentOutcome::classify(intent.criticality(), self.settle(&signed, cancel).await)
    }

    async fn prepare(
        &self,
        intent: &TransactionIntent,
        nonce: u64,
        chain_id: u64,
    ) -> ChainResult<SignedTransaction> {
        let gas_price = self.gateway.gas_price().await?;
        let gas_price = self.settings.adjust_gas_price(gas_price)?;

        let draft = TransactionDraft {
            to: intent.to,
            data: intent.data.clone(),
            value: intent.value,
            nonce,
            gas_limit: intent.gas_limit.unwrap_or(self.settings.gas_limit),
            gas_price,
            chain_id,
        };

        self.gateway.sign(draft).await
    }

    async fn settle(
        &self,
        signed: &SignedTransaction,
        cancel: &CancellationToken,
    ) -> ChainResult<Receipt> {
        let tx_hash = self.gateway.broadcast(signed).await?;
        tracing::info!(tx_hash = %tx_hash, nonce = signed.nonce, "Broadcasting");

        let started = Instant::now();
        let receipt = self.await_receipt(tx_hash, cancel).await?;
        metrics::record_settlement(started.elapsed());

        if !receipt.is_success() {
            return Err(ChainError::Reverted { tx_hash });
        }
        Ok(receipt)
    }

    /// Wait for a receipt under the settlement bound, or until cancelled.
    async fn await_receipt(
        &self,
        tx_hash: TxHash,
        cancel: &CancellationToken,
    ) -> ChainResult<Receipt> {
        let wait = self.gateway.wait_for_receipt(tx_hash);
        let bounded = async {
            match self.settings.settlement_timeout {
                Some(limit) => timeout(limit, wait).await.unwrap_or_else(|_| {
                    Err(ChainError::SettlementTimeout {
                        tx_hash,
                        waited: limit,
                    })
                }),
                None => wait.await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ChainError::Cancelled { tx_hash: Some(tx_hash) }),
            result = bounded => result,
        }
    }
}

impl std::fmt::Debug for TransactionExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionExecutor")
            .field("address", &self.gateway.address())
            .field("settings", &self.settings)
            .finish()
    }
}
