//! High-level agent API: builder requests, batch execution and paid resource access.

use alloy::primitives::Address;
use async_trait::async_trait;
use reqwest::{Client, Request};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::builder::types::{
    CommerceBatchRequest, RegisterIdentityRequest, StockRequest, COMMERCE_BATCH_ENDPOINT,
    REGISTER_IDENTITY_ENDPOINT, STOCK_INVENTORY_ENDPOINT,
};
use crate::builder::{BuilderClient, BuilderStatus};
use crate::chain::{ChainGateway, Receipt, RpcGateway, Wallet};
use crate::config::AgentConfig;
use crate::error::AgentResult;
use crate::execution::{BatchReport, ExecutionSettings, TransactionExecutor, TransactionIntent};
use crate::holocron::{parse_coordinate, Holocron};
use crate::x402::{NegotiatedResponse, NegotiationResult, PaymentNegotiator, ResourcePurchaser};

/// Result of a shelf-stocking request.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StockOutcome {
    pub receipt: Option<Receipt>,
    /// Items the builder reports as stocked (or about to be, on a dry run).
    pub items: Vec<Value>,
    /// Only populated on a dry run.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub transactions: Vec<TransactionIntent>,
}

/// Result of a Holocron sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// The coordinate was already on the index; nothing was sent.
    AlreadyIndexed,
    Indexed {
        registration: Option<Receipt>,
        index: Option<Receipt>,
    },
}

/// One account's agent: talks to the builder, executes what it returns, pays for resources.
pub struct ReapAgent {
    builder: BuilderClient,
    executor: TransactionExecutor,
    holocron: Holocron,
    http: Client,
    cancel: CancellationToken,
}

impl ReapAgent {
    pub fn new(
        gateway: Arc<dyn ChainGateway>,
        builder: BuilderClient,
        settings: ExecutionSettings,
        holocron: Holocron,
    ) -> Self {
        Self {
            builder,
            executor: TransactionExecutor::new(gateway, settings),
            holocron,
            http: Client::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Build an agent from configuration, connecting to the configured RPC endpoints.
    pub async fn connect(config: &AgentConfig, wallet: Wallet) -> AgentResult<Self> {
        let gateway = RpcGateway::new(config.chain.clone(), wallet).await?;

        let mut builder = BuilderClient::new(&config.builder)?;
        match gateway.chain_id().await {
            Ok(chain_id) => {
                builder = builder.with_chain_id(chain_id);
                tracing::info!(address = %gateway.address(), chain_id, "Reap agent online");
            }
            Err(e) => tracing::warn!(error = %e, "Chain id unavailable; builder payloads untagged"),
        }

        Ok(Self::new(
            Arc::new(gateway),
            builder,
            ExecutionSettings::from(&config.execution),
            Holocron::from_config(&config.holocron)?,
        ))
    }

    /// Share a cancellation token; cancelling it aborts the in-flight batch.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Use a preconfigured HTTP client for [`ReapAgent::fetch`].
    pub fn with_http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    pub fn address(&self) -> Address {
        self.executor.gateway().address()
    }

    /// Client used for resource fetches, handy for building requests.
    pub fn http(&self) -> &Client {
        &self.http
    }

    pub fn builder(&self) -> &BuilderClient {
        &self.builder
    }

    /// Execute intents under the agent's cancellation token.
    pub async fn execute(&self, intents: &[TransactionIntent]) -> AgentResult<BatchReport> {
        Ok(self.executor.execute_batch(intents, &self.cancel).await?)
    }

    async fn execute_last(&self, intents: &[TransactionIntent]) -> AgentResult<Option<Receipt>> {
        Ok(self.execute(intents).await?.into_last_receipt())
    }

    /// Register the agent's on-chain identity. `None` when already registered.
    pub async fn register_identity(&self, profile_uri: &str) -> AgentResult<Option<Receipt>> {
        tracing::info!(profile_uri, "Registering protocol identity");
        let request = RegisterIdentityRequest {
            user_address: self.address(),
            profile_uri: profile_uri.to_string(),
        };
        let res = self.builder.call(REGISTER_IDENTITY_ENDPOINT, &request).await?;

        if res.status == BuilderStatus::AlreadyRegistered {
            tracing::info!(agent_id = ?res.agent_id, "Already registered, skipping");
            return Ok(None);
        }

        self.execute_last(&res.transactions).await
    }

    /// Stock the shelf with products matching `query`.
    ///
    /// A dry run returns the builder's preview without sending anything.
    pub async fn stock_shelf(&self, query: &str, dry_run: bool) -> AgentResult<StockOutcome> {
        tracing::info!(query, dry_run, "Stocking shelf");
        let request = StockRequest {
            product_query: query.to_string(),
            provider_address: self.address(),
        };
        let res = self.builder.call(STOCK_INVENTORY_ENDPOINT, &request).await?;

        if res.status == BuilderStatus::PaymentRequired {
            tracing::info!(invoice = res.description().unwrap_or("-"), "Builder requires payment");
            if dry_run {
                return Ok(StockOutcome::default());
            }
            let receipt = self.execute_last(&res.transactions).await?;
            return Ok(StockOutcome {
                receipt,
                ..StockOutcome::default()
            });
        }

        let items = res.items();
        if dry_run {
            tracing::info!(
                items = items.len(),
                transactions = res.transactions.len(),
                "Dry run preview"
            );
            return Ok(StockOutcome {
                receipt: None,
                items,
                transactions: res.transactions,
            });
        }

        let receipt = self.execute_last(&res.transactions).await?;
        Ok(StockOutcome {
            receipt,
            items,
            transactions: Vec::new(),
        })
    }

    /// Buy a single product through the commerce batch endpoint.
    pub async fn buy_product(&self, product_id: &str) -> AgentResult<Option<Receipt>> {
        tracing::info!(product_id, "Buying product");
        self.buy(vec![product_id.to_string()]).await
    }

    pub async fn buy_cart(&self, product_ids: &[String]) -> AgentResult<Option<Receipt>> {
        tracing::info!(items = product_ids.len(), "Buying cart");
        self.buy(product_ids.to_vec()).await
    }

    async fn buy(&self, product_ids: Vec<String>) -> AgentResult<Option<Receipt>> {
        let request = CommerceBatchRequest { product_ids };
        let res = self.builder.call(COMMERCE_BATCH_ENDPOINT, &request).await?;
        self.execute_last(&res.transactions).await
    }

    /// Read-only product lookup.
    pub async fn get_product(&self, product_id: &str) -> AgentResult<Value> {
        Ok(self.builder.get_product(product_id).await?)
    }

    /// Whether a product coordinate is on the Holocron index.
    pub async fn check_holocron(&self, coordinate: &str) -> AgentResult<bool> {
        let coordinate = parse_coordinate(coordinate)?;
        let exists = self
            .holocron
            .contains(self.executor.gateway().as_ref(), coordinate)
            .await;
        tracing::info!(coordinate = %coordinate, exists, "Holocron lookup");
        Ok(exists)
    }

    /// Register (if given) and index a product coordinate unless it is already indexed.
    pub async fn smart_sync(
        &self,
        coordinate: &str,
        registration: Option<TransactionIntent>,
    ) -> AgentResult<SyncOutcome> {
        let parsed = parse_coordinate(coordinate)?;
        if self
            .holocron
            .contains(self.executor.gateway().as_ref(), parsed)
            .await
        {
            tracing::info!(coordinate, "Already indexed, skipping registration");
            return Ok(SyncOutcome::AlreadyIndexed);
        }

        let registration = match registration {
            Some(intent) => self.execute_last(&[intent]).await?,
            None => {
                tracing::info!(coordinate, "No registration transaction, indexing only");
                None
            }
        };

        let index = self
            .execute_last(&[self.holocron.index_intent(parsed)])
            .await?;

        Ok(SyncOutcome::Indexed {
            registration,
            index,
        })
    }

    /// Negotiator that buys challenged resources with this agent.
    pub fn negotiator(&self) -> PaymentNegotiator<&Self> {
        PaymentNegotiator::new(self.http.clone(), self)
    }

    /// Fetch a resource, paying for it if the server answers 402.
    pub async fn fetch(&self, request: Request) -> NegotiationResult<NegotiatedResponse> {
        self.negotiator().fetch(request).await
    }
}

#[async_trait]
impl ResourcePurchaser for ReapAgent {
    async fn purchase(&self, resource_id: &str) -> AgentResult<Option<Receipt>> {
        self.buy_product(resource_id).await
    }
}

impl std::fmt::Debug for ReapAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReapAgent")
            .field("address", &self.address())
            .field("builder", &self.builder.base_url())
            .field("holocron", &self.holocron.router())
            .finish()
    }
}
