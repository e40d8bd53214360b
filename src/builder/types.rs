//! Builder service wire types.

use alloy::primitives::Address;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::execution::intent::TransactionIntent;

pub const REGISTER_IDENTITY_ENDPOINT: &str = "/build/identity/register";
pub const STOCK_INVENTORY_ENDPOINT: &str = "/build/inventory/stock";
pub const COMMERCE_BATCH_ENDPOINT: &str = "/build/commerce/batch";

/// Builder verdict for a build request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuilderStatus {
    /// Transactions are ready to execute. Also assumed when the field is missing.
    #[default]
    Ok,
    /// The request needs a payment first; `transactions` carries it.
    PaymentRequired,
    /// Identity registration was a no-op.
    AlreadyRegistered,
    #[serde(other)]
    Unrecognized,
}

/// Response envelope shared by all build endpoints.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BuilderResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: BuilderStatus,

    #[serde(default, deserialize_with = "null_as_default")]
    pub transactions: Vec<TransactionIntent>,

    /// Endpoint-specific extras (invoice description, stocked items).
    #[serde(default)]
    pub meta: Value,

    /// Set on `already_registered`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<Value>,
}

impl BuilderResponse {
    /// `meta.items`, or empty.
    pub fn items(&self) -> Vec<Value> {
        match self.meta.get("items") {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        }
    }

    /// `meta.description`, the human-readable invoice for payment-required responses.
    pub fn description(&self) -> Option<&str> {
        self.meta.get("description").and_then(Value::as_str)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterIdentityRequest {
    pub user_address: Address,
    pub profile_uri: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StockRequest {
    pub product_query: String,
    pub provider_address: Address,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommerceBatchRequest {
    pub product_ids: Vec<String>,
}
