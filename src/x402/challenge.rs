//! x402 challenge parsing and proof derivation.

use alloy::primitives::hex;
use reqwest::header::{HeaderMap, WWW_AUTHENTICATE};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::chain::types::Receipt;

/// Authorization scheme for payment proofs.
pub const PROOF_SCHEME: &str = "X402-Proof";

const RESOURCE_ID_MARKER: &str = "resource_id=\"";

/// Why a 402 challenge could not be acted on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChallengeError {
    #[error("402 response has no WWW-Authenticate header")]
    MissingHeader,

    #[error("WWW-Authenticate header is not visible ASCII")]
    InvalidHeader,

    #[error("challenge carries no resource_id")]
    MissingResourceId,

    #[error("challenge resource_id is not terminated")]
    UnterminatedResourceId,

    #[error("challenge resource_id is empty")]
    EmptyResourceId,
}

/// The resource a 402 response asks the client to buy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentChallenge {
    pub resource_id: String,
}

impl PaymentChallenge {
    /// Extract the challenge from a response's `WWW-Authenticate` headers.
    ///
    /// Repeated headers are joined with `", "` before parsing, so the challenge may sit in any
    /// of them.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, ChallengeError> {
        let values = headers
            .get_all(WWW_AUTHENTICATE)
            .iter()
            .map(|v| v.to_str().map_err(|_| ChallengeError::InvalidHeader))
            .collect::<Result<Vec<_>, _>>()?;
        if values.is_empty() {
            return Err(ChallengeError::MissingHeader);
        }
        values.join(", ").parse()
    }
}

impl FromStr for PaymentChallenge {
    type Err = ChallengeError;

    /// Takes the text between the first `resource_id="` and the next `"`.
    fn from_str(header: &str) -> Result<Self, Self::Err> {
        let start = header
            .find(RESOURCE_ID_MARKER)
            .ok_or(ChallengeError::MissingResourceId)?
            + RESOURCE_ID_MARKER.len();
        let len = header[start..]
            .find('"')
            .ok_or(ChallengeError::UnterminatedResourceId)?;

        let resource_id = &header[start..start + len];
        if resource_id.is_empty() {
            return Err(ChallengeError::EmptyResourceId);
        }

        Ok(Self {
            resource_id: resource_id.to_string(),
        })
    }
}

/// Proof of payment: the settling transaction's hash as 0x-prefixed lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofToken(String);

impl ProofToken {
    pub fn from_receipt(receipt: &Receipt) -> Self {
        Self(hex::encode_prefixed(receipt.transaction_hash))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value for the retried request's `Authorization` header.
    pub fn header_value(&self) -> String {
        format!("{} {}", PROOF_SCHEME, self.0)
    }
}

impl fmt::Display for ProofToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
