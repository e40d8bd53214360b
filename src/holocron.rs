//! Holocron product index.
//!
//! The router contract records which product coordinates are already on-chain, letting the
//! agent skip registration for indexed items.

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::{sol_data, SolCall, SolType};

use crate::chain::gateway::ChainGateway;
use crate::config::schema::HolocronConfig;
use crate::error::{AgentError, AgentResult};
use crate::execution::intent::{Criticality, TransactionIntent};

sol! {
    interface IHolocronRouter {
        function checkExistence(uint256 _c) external view returns (bool);
        function stock(uint256 _c) external;
    }
}

/// Label of the index transaction.
pub const INDEX_LABEL: &str = "Index Holocron";

/// Parse a decimal (or 0x) product coordinate.
pub fn parse_coordinate(coordinate: &str) -> AgentResult<U256> {
    coordinate
        .trim()
        .parse::<U256>()
        .map_err(|e| AgentError::InvalidInput(format!("coordinate '{}': {}", coordinate, e)))
}

/// Handle on the router contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Holocron {
    router: Address,
    index_gas_limit: u64,
}

impl Holocron {
    pub fn new(router: Address, index_gas_limit: u64) -> Self {
        Self {
            router,
            index_gas_limit,
        }
    }

    pub fn from_config(config: &HolocronConfig) -> AgentResult<Self> {
        let router = config.router_address.parse::<Address>().map_err(|e| {
            AgentError::InvalidInput(format!("router address '{}': {}", config.router_address, e))
        })?;
        Ok(Self::new(router, config.index_gas_limit))
    }

    pub fn router(&self) -> Address {
        self.router
    }

    /// Whether `coordinate` is indexed. A failed or undecodable call reads as "not indexed".
    pub async fn contains(&self, gateway: &dyn ChainGateway, coordinate: U256) -> bool {
        let data = Bytes::from(IHolocronRouter::checkExistenceCall { _c: coordinate }.abi_encode());
        match gateway.call(self.router, data).await {
            Ok(output) => match <sol_data::Bool as SolType>::abi_decode(&output) {
                Ok(exists) => exists,
                Err(e) => {
                    tracing::warn!(coordinate = %coordinate, error = %e, "Undecodable Holocron answer");
                    false
                }
            },
            Err(e) => {
                tracing::warn!(coordinate = %coordinate, error = %e, "Holocron lookup failed");
                false
            }
        }
    }

    /// Critical `stock(coordinate)` intent with the index gas limit.
    pub fn index_intent(&self, coordinate: U256) -> TransactionIntent {
        let data = Bytes::from(IHolocronRouter::stockCall { _c: coordinate }.abi_encode());
        TransactionIntent::new(self.router, data, U256::ZERO, INDEX_LABEL)
            .with_criticality(Criticality::Critical)
            .with_gas_limit(self.index_gas_limit)
    }
}
