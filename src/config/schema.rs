//! Configuration schema definitions.
//!
//! All sections carry defaults so that an empty file (or no file at all) yields a working
//! agent pointed at the public builder service.

use serde::{Deserialize, Serialize};

/// Default router contract for the Holocron product index.
pub const DEFAULT_HOLOCRON_ROUTER: &str = "0x2cEC5Bf3a0D3fEe4E13e8f2267176BdD579F4fd8";

/// Root configuration for the agent.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AgentConfig {
    /// Ledger connection settings.
    pub chain: ChainConfig,

    /// Remote transaction builder service.
    pub builder: BuilderConfig,

    /// Batch execution policy.
    pub execution: ExecutionConfig,

    pub holocron: HolocronConfig,

    pub observability: ObservabilityConfig,
}

/// Ledger connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChainConfig {
    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs, tried in order.
    pub failover_urls: Vec<String>,

    /// When set, the connected node must report this chain id.
    pub expected_chain_id: Option<u64>,

    /// Per-call RPC timeout in seconds.
    pub rpc_timeout_secs: u64,

    /// First receipt poll delay in milliseconds.
    pub receipt_poll_interval_ms: u64,

    /// Upper bound on the receipt poll delay in milliseconds.
    pub receipt_poll_max_interval_ms: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://sepolia.base.org".to_string(),
            failover_urls: Vec::new(),
            expected_chain_id: None,
            rpc_timeout_secs: 10,
            receipt_poll_interval_ms: 500,
            receipt_poll_max_interval_ms: 4_000,
        }
    }
}

/// Builder service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Base URL, e.g. "https://api.reap.deals". A trailing slash is ignored.
    pub base_url: String,

    /// HTTP request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.reap.deals".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Transaction execution policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Gas limit for intents that do not carry their own.
    pub gas_limit: u64,

    /// Gas price multiplier (1.0 = node estimate, 1.1 = 10% buffer).
    pub gas_price_multiplier: f64,

    /// Maximum gas price in gwei (protection against spikes).
    pub max_gas_price_gwei: u64,

    /// Bound on each wait for settlement in seconds; 0 waits indefinitely.
    pub settlement_timeout_secs: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            gas_limit: 500_000,
            gas_price_multiplier: 1.1,
            max_gas_price_gwei: 500,
            settlement_timeout_secs: 120,
        }
    }
}

/// Holocron product index configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HolocronConfig {
    /// Router contract address.
    pub router_address: String,

    /// Gas limit for `stock` index transactions.
    pub index_gas_limit: u64,
}

impl Default for HolocronConfig {
    fn default() -> Self {
        Self {
            router_address: DEFAULT_HOLOCRON_ROUTER.to_string(),
            index_gas_limit: 150_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error), used when RUST_LOG is unset.
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
