//! x402 payment negotiation.
//!
//! This module handles the pay-per-resource flow:
//! 1. Make the original request
//! 2. On 402, read `resource_id` from the `WWW-Authenticate` challenge
//! 3. Buy the resource through a [`ResourcePurchaser`]
//! 4. Retry once with `Authorization: X402-Proof <tx hash>`

mod challenge;
mod negotiator;

pub use challenge::{ChallengeError, PaymentChallenge, ProofToken, PROOF_SCHEME};
pub use negotiator::{
    NegotiatedResponse, NegotiationError, NegotiationOutcome, NegotiationResult,
    NegotiationState, PaymentNegotiator, ResourcePurchaser,
};
