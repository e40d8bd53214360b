//! Resilience helpers shared by the chain and builder clients.
//!
//! Every remote call made by the agent has a deadline: RPC calls use the
//! per-provider timeout in `chain::client`, receipt waits are bounded by the
//! executor, and receipt polling backs off with jitter.

pub mod backoff;
