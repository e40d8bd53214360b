//! Transaction intents as produced by the builder service.

use alloy::primitives::{Address, Bytes, U256};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Label fragments that mark an intent as critical when the builder does not tag it.
const CRITICAL_LABEL_MARKERS: [&str; 2] = ["Pay", "Approve"];

/// How a failed intent affects the rest of its batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criticality {
    /// Failure aborts the batch (payments, approvals).
    Critical,
    /// Failure is logged and the batch moves on (stocking, indexing of optional data).
    BestEffort,
}

impl fmt::Display for Criticality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Criticality::Critical => f.write_str("critical"),
            Criticality::BestEffort => f.write_str("best-effort"),
        }
    }
}

/// A desired ledger transaction before signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionIntent {
    /// Destination contract or account.
    pub to: Address,

    /// Call data.
    #[serde(default)]
    pub data: Bytes,

    /// Native value in wei. Accepts a JSON number, a decimal string or a 0x string.
    #[serde(default, deserialize_with = "deserialize_value")]
    pub value: U256,

    /// Human-readable step name, e.g. "Approve USDC".
    #[serde(default)]
    pub label: String,

    /// Explicit tag from the builder; overrides label inference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criticality: Option<Criticality>,

    /// Per-intent gas limit override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<u64>,
}

impl TransactionIntent {
    pub fn new(to: Address, data: Bytes, value: U256, label: impl Into<String>) -> Self {
        Self {
            to,
            data,
            value,
            label: label.into(),
            criticality: None,
            gas_limit: None,
        }
    }

    pub fn with_criticality(mut self, criticality: Criticality) -> Self {
        self.criticality = Some(criticality);
        self
    }

    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }

    /// Resolve criticality: the explicit tag if any, else the label rule.
    pub fn criticality(&self) -> Criticality {
        if let Some(tag) = self.criticality {
            return tag;
        }
        if CRITICAL_LABEL_MARKERS
            .iter()
            .any(|marker| self.label.contains(marker))
        {
            Criticality::Critical
        } else {
            Criticality::BestEffort
        }
    }

    /// Label for logs and errors; unlabeled intents are numbered from 1.
    pub fn display_label(&self, index: usize) -> String {
        if self.label.is_empty() {
            format!("Tx {}", index + 1)
        } else {
            self.label.clone()
        }
    }
}

fn deserialize_value<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => Ok(U256::ZERO),
        serde_json::Value::Number(n) => match n.as_u64() {
            Some(v) => Ok(U256::from(v)),
            None => n
                .to_string()
                .parse::<U256>()
                .map_err(|e| D::Error::custom(format!("invalid value {}: {}", n, e))),
        },
        serde_json::Value::String(s) => s
            .trim()
            .parse::<U256>()
            .map_err(|e| D::Error::custom(format!("invalid value '{}': {}", s, e))),
        other => Err(D::Error::custom(format!("invalid value type: {}", other))),
    }
}
