//! Shared utilities for integration tests.

#![allow(dead_code)]

use alloy::primitives::{keccak256, Address, Bytes, TxHash, U256};
use async_trait::async_trait;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

use reap_agent::builder::BuilderClient;
use reap_agent::chain::{
    ChainError, ChainGateway, ChainResult, Receipt, SignedTransaction, TransactionDraft,
};
use reap_agent::config::BuilderConfig;
use reap_agent::execution::{ExecutionSettings, TransactionIntent};
use reap_agent::holocron::Holocron;
use reap_agent::ReapAgent;

pub const AGENT_ADDRESS: Address = Address::repeat_byte(0xa1);
pub const CONTRACT_ADDRESS: Address = Address::repeat_byte(0xc0);
pub const CHAIN_ID: u64 = 31337;
pub const ROUTER_ADDRESS: Address = Address::repeat_byte(0x4f);
pub const GAS_PRICE: u128 = 2_000_000_000;

/// What the mock chain does with a transaction, keyed by the intent label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Settle,
    Revert,
    BroadcastFail,
    ReceiptFail,
    /// Never produces a receipt.
    Hang,
}

/// One call to `broadcast`, successful or not.
#[derive(Debug, Clone)]
pub struct BroadcastRecord {
    pub label: String,
    pub nonce: u64,
    pub gas_limit: u64,
    pub gas_price: u128,
    pub hash: TxHash,
    pub accepted: bool,
}

/// Intent whose call data is its label, so the mock can recognise it after signing.
pub fn intent(label: &str) -> TransactionIntent {
    TransactionIntent::new(
        CONTRACT_ADDRESS,
        Bytes::from(label.as_bytes().to_vec()),
        U256::ZERO,
        label,
    )
}

/// The builder's JSON form of [`intent`].
pub fn wire_intent(label: &str) -> serde_json::Value {
    serde_json::to_value(intent(label)).unwrap()
}

/// Settings with a short settlement bound and no gas buffer.
pub fn settings() -> ExecutionSettings {
    ExecutionSettings {
        gas_limit: 500_000,
        gas_price_multiplier: 1.0,
        max_gas_price_gwei: 500,
        settlement_timeout: Some(std::time::Duration::from_secs(5)),
    }
}

/// Scriptable in-memory ledger for a single account.
///
/// Every accepted broadcast consumes a nonce, reverted or not.
pub struct MockGateway {
    pending_nonce: u64,
    gas_price: Mutex<u128>,
    nonce_unavailable: Mutex<bool>,
    behaviors: Mutex<HashMap<String, Behavior>>,
    drafts: Mutex<HashMap<TxHash, TransactionDraft>>,
    broadcasts: Mutex<Vec<BroadcastRecord>>,
    holocron_answer: Mutex<Option<bool>>,
    calls: Mutex<Vec<(Address, Bytes)>>,
}

impl MockGateway {
    pub fn new(pending_nonce: u64) -> Self {
        Self {
            pending_nonce,
            gas_price: Mutex::new(GAS_PRICE),
            nonce_unavailable: Mutex::new(false),
            behaviors: Mutex::new(HashMap::new()),
            drafts: Mutex::new(HashMap::new()),
            broadcasts: Mutex::new(Vec::new()),
            holocron_answer: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Unscripted labels settle.
    pub fn script(self, label: &str, behavior: Behavior) -> Self {
        self.behaviors
            .lock()
            .unwrap()
            .insert(label.to_string(), behavior);
        self
    }

    pub fn set_gas_price(&self, gas_price: u128) {
        *self.gas_price.lock().unwrap() = gas_price;
    }

    pub fn fail_nonce_queries(&self) {
        *self.nonce_unavailable.lock().unwrap() = true;
    }

    /// Answer for `eth_call`; `None` makes calls fail.
    pub fn set_holocron_answer(&self, exists: Option<bool>) {
        *self.holocron_answer.lock().unwrap() = exists;
    }

    pub fn broadcasts(&self) -> Vec<BroadcastRecord> {
        self.broadcasts.lock().unwrap().clone()
    }

    pub fn broadcast_labels(&self) -> Vec<String> {
        self.broadcasts().into_iter().map(|b| b.label).collect()
    }

    pub fn broadcast_nonces(&self) -> Vec<u64> {
        self.broadcasts().into_iter().map(|b| b.nonce).collect()
    }

    pub fn calls(&self) -> Vec<(Address, Bytes)> {
        self.calls.lock().unwrap().clone()
    }

    fn label_of(data: &Bytes) -> String {
        String::from_utf8_lossy(data).into_owned()
    }

    fn behavior_for(&self, label: &str) -> Behavior {
        self.behaviors
            .lock()
            .unwrap()
            .get(label)
            .copied()
            .unwrap_or(Behavior::Settle)
    }
}

#[async_trait]
impl ChainGateway for MockGateway {
    fn address(&self) -> Address {
        AGENT_ADDRESS
    }

    async fn pending_nonce(&self, address: Address) -> ChainResult<u64> {
        assert_eq!(address, AGENT_ADDRESS);
        if *self.nonce_unavailable.lock().unwrap() {
            return Err(ChainError::Rpc("node unreachable".to_string()));
        }
        let accepted = self.broadcasts().iter().filter(|b| b.accepted).count() as u64;
        Ok(self.pending_nonce + accepted)
    }

    async fn gas_price(&self) -> ChainResult<u128> {
        Ok(*self.gas_price.lock().unwrap())
    }

    async fn chain_id(&self) -> ChainResult<u64> {
        Ok(CHAIN_ID)
    }

    async fn sign(&self, draft: TransactionDraft) -> ChainResult<SignedTransaction> {
        let mut preimage = draft.data.to_vec();
        preimage.extend_from_slice(&draft.nonce.to_be_bytes());
        let hash = keccak256(&preimage);

        let signed = SignedTransaction {
            hash,
            raw: draft.data.clone(),
            nonce: draft.nonce,
        };
        self.drafts.lock().unwrap().insert(hash, draft);
        Ok(signed)
    }

    async fn broadcast(&self, tx: &SignedTransaction) -> ChainResult<TxHash> {
        let draft = self.drafts.lock().unwrap().get(&tx.hash).cloned().unwrap();
        let label = Self::label_of(&draft.data);
        let accepted = self.behavior_for(&label) != Behavior::BroadcastFail;

        self.broadcasts.lock().unwrap().push(BroadcastRecord {
            label: label.clone(),
            nonce: draft.nonce,
            gas_limit: draft.gas_limit,
            gas_price: draft.gas_price,
            hash: tx.hash,
            accepted,
        });

        if !accepted {
            return Err(ChainError::Broadcast(format!("rejected {}", label)));
        }
        Ok(tx.hash)
    }

    async fn wait_for_receipt(&self, tx_hash: TxHash) -> ChainResult<Receipt> {
        let draft = self.drafts.lock().unwrap().get(&tx_hash).cloned().unwrap();
        let status = match self.behavior_for(&Self::label_of(&draft.data)) {
            Behavior::Settle | Behavior::BroadcastFail => 1,
            Behavior::Revert => 0,
            Behavior::ReceiptFail => return Err(ChainError::Rpc("receipt lookup failed".into())),
            Behavior::Hang => std::future::pending().await,
        };

        Ok(Receipt {
            transaction_hash: tx_hash,
            status,
            block_number: Some(100 + draft.nonce),
            gas_used: 42_000,
        })
    }

    async fn call(&self, to: Address, data: Bytes) -> ChainResult<Bytes> {
        self.calls.lock().unwrap().push((to, data));
        match *self.holocron_answer.lock().unwrap() {
            Some(exists) => {
                let mut word = [0u8; 32];
                word[31] = u8::from(exists);
                Ok(Bytes::from(word.to_vec()))
            }
            None => Err(ChainError::Rpc("execution reverted".to_string())),
        }
    }
}

/// Serve `router` on an ephemeral loopback port.
pub async fn spawn_server(router: axum::Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

pub fn builder_client(addr: SocketAddr) -> BuilderClient {
    let config = BuilderConfig {
        base_url: format!("http://{}", addr),
        timeout_secs: 5,
    };
    BuilderClient::new(&config).unwrap().with_chain_id(CHAIN_ID)
}

/// Agent wired to the mock ledger and a builder at `builder_addr`.
pub fn agent(gateway: &Arc<MockGateway>, builder_addr: SocketAddr) -> ReapAgent {
    ReapAgent::new(
        gateway.clone(),
        builder_client(builder_addr),
        settings(),
        Holocron::new(ROUTER_ADDRESS, 150_000),
    )
}
