//! Metrics recorded through the `metrics` facade.
//!
//! # Metrics
//! - `reap_transactions_total` (counter): intent attempts by outcome (settled, skipped, fatal)
//! - `reap_settlement_seconds` (histogram): broadcast-to-receipt latency
//! - `reap_payment_negotiations_total` (counter): x402 fetches by outcome
//!   (not_required, challenge_rejected, failed, paid, paid_rejected)
//!
//! Nothing is exported unless the embedding application installs a recorder.

use std::time::Duration;

/// Count one intent attempt.
pub fn record_transaction(outcome: &'static str) {
    ::metrics::counter!("reap_transactions_total", "outcome" => outcome).increment(1);
}

/// Record how long a transaction took to settle.
pub fn record_settlement(elapsed: Duration) {
    ::metrics::histogram!("reap_settlement_seconds").record(elapsed.as_secs_f64());
}

/// Count one payment negotiation.
pub fn record_negotiation(outcome: &'static str) {
    ::metrics::counter!("reap_payment_negotiations_total", "outcome" => outcome).increment(1);
}
