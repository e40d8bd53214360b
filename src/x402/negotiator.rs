//! x402 negotiation over an arbitrary outbound request.
//!
//! # States
//! ```text
//! Idle ──fetch──▶ Done                        (status != 402)
//! Idle ──fetch──▶ ChallengeReceived ──▶ Paying ──▶ ProofAttached ──refetch──▶ Done
//!                       │
//!                       └─ malformed challenge ──▶ Done (original 402 returned)
//! ```
//!
//! The retry happens exactly once. Whatever it returns, including another 402, goes back to
//! the caller unchanged.

use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Client, Request, Response, StatusCode};
use std::fmt;
use thiserror::Error;

use crate::chain::types::Receipt;
use crate::error::AgentError;
use crate::observability::metrics;
use crate::x402::challenge::{ChallengeError, PaymentChallenge, ProofToken};

/// Buys a resource named by a 402 challenge.
#[async_trait]
pub trait ResourcePurchaser: Send + Sync {
    /// Pay for `resource_id` and return the settling receipt, if any settled.
    async fn purchase(&self, resource_id: &str) -> Result<Option<Receipt>, AgentError>;
}

#[async_trait]
impl<T: ResourcePurchaser + ?Sized> ResourcePurchaser for &T {
    async fn purchase(&self, resource_id: &str) -> Result<Option<Receipt>, AgentError> {
        (**self).purchase(resource_id).await
    }
}

/// Failures that stop a negotiation without a response to return.
#[derive(Debug, Error)]
pub enum NegotiationError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The request body is a stream and cannot be sent a second time.
    #[error("Request cannot be replayed with a payment proof")]
    UnclonableRequest,

    #[error("Purchase of '{resource_id}' failed: {source}")]
    Purchase {
        resource_id: String,
        source: AgentError,
    },

    #[error("Purchase of '{resource_id}' settled no transaction; no proof to present")]
    NothingSettled { resource_id: String },

    #[error("Invalid proof header: {0}")]
    InvalidProof(String),
}

pub type NegotiationResult<T> = Result<T, NegotiationError>;

/// Protocol position, used for tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    Idle,
    ChallengeReceived,
    Paying,
    ProofAttached,
    Done,
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NegotiationState::Idle => "idle",
            NegotiationState::ChallengeReceived => "challenge_received",
            NegotiationState::Paying => "paying",
            NegotiationState::ProofAttached => "proof_attached",
            NegotiationState::Done => "done",
        };
        f.write_str(name)
    }
}

/// How a fetch was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegotiationOutcome {
    /// The first response was not a 402.
    NotRequired,
    /// A 402 arrived but its challenge was unusable; that 402 is the response.
    ChallengeRejected(ChallengeError),
    /// The resource was bought and the request retried with this proof.
    Paid {
        resource_id: String,
        proof: ProofToken,
    },
}

/// Final response plus how it was obtained.
#[derive(Debug)]
pub struct NegotiatedResponse {
    pub response: Response,
    pub outcome: NegotiationOutcome,
}

impl NegotiatedResponse {
    pub fn into_response(self) -> Response {
        self.response
    }
}

/// Wraps outbound fetches with the x402 pay-and-retry protocol.
#[derive(Debug, Clone)]
pub struct PaymentNegotiator<P> {
    http: Client,
    purchaser: P,
}

impl<P: ResourcePurchaser> PaymentNegotiator<P> {
    pub fn new(http: Client, purchaser: P) -> Self {
        Self { http, purchaser }
    }

    /// Send `request`, paying and retrying once if the server answers 402.
    ///
    /// The request is consumed; the retry is an independent clone with its own headers.
    pub async fn fetch(&self, request: Request) -> NegotiationResult<NegotiatedResponse> {
        let url = request.url().clone();
        let method = request.method().clone();
        let replay = request.try_clone();
        let mut state = NegotiationState::Idle;

        tracing::info!(%method, %url, %state, "Accessing resource");
        let response = self.http.execute(request).await?;

        if response.status() != StatusCode::PAYMENT_REQUIRED {
            metrics::record_negotiation("not_required");
            return Ok(NegotiatedResponse {
                response,
                outcome: NegotiationOutcome::NotRequired,
            });
        }

        state = NegotiationState::ChallengeReceived;
        let challenge = match PaymentChallenge::from_headers(response.headers()) {
            Ok(challenge) => challenge,
            Err(e) => {
                metrics::record_negotiation("challenge_rejected");
                tracing::warn!(%url, %state, error = %e, "Unusable x402 challenge, returning 402");
                return Ok(NegotiatedResponse {
                    response,
                    outcome: NegotiationOutcome::ChallengeRejected(e),
                });
            }
        };
        let mut retry = replay.ok_or(NegotiationError::UnclonableRequest)?;
        let resource_id = challenge.resource_id;

        state = NegotiationState::Paying;
        tracing::info!(%url, %state, resource_id = %resource_id, "x402 payment required, purchasing");
        let receipt = match self.purchaser.purchase(&resource_id).await {
            Ok(Some(receipt)) => receipt,
            Ok(None) => {
                metrics::record_negotiation("failed");
                return Err(NegotiationError::NothingSettled { resource_id });
            }
            Err(source) => {
                metrics::record_negotiation("failed");
                return Err(NegotiationError::Purchase {
                    resource_id,
                    source,
                });
            }
        };

        let proof = ProofToken::from_receipt(&receipt);
        let header = HeaderValue::from_str(&proof.header_value())
            .map_err(|e| NegotiationError::InvalidProof(e.to_string()))?;
        retry.headers_mut().insert(AUTHORIZATION, header);

        state = NegotiationState::ProofAttached;
        tracing::info!(%url, %state, proof = %proof, "Submitting proof for release");
        let response = self.http.execute(retry).await?;

        state = NegotiationState::Done;
        tracing::info!(%url, %state, status = response.status().as_u16(), "x402 negotiation finished");
        metrics::record_negotiation(retry_outcome(response.status()));

        Ok(NegotiatedResponse {
            response,
            outcome: NegotiationOutcome::Paid { resource_id, proof },
        })
    }
}

/// Metric label for the paid retry's response.
fn retry_outcome(status: StatusCode) -> &'static str {
    if status == StatusCode::PAYMENT_REQUIRED {
        "paid_rejected"
    } else {
        "paid"
    }
}
