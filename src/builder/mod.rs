//! Builder service client.
//!
//! The builder turns high-level requests (register, stock, buy) into ordered
//! transaction intents for the executor. Every non-200 answer becomes a
//! [`BuilderError::Rejected`] carrying the service's `detail` message.

pub mod client;
pub mod types;

pub use client::{BuilderClient, BuilderError, BuilderResult};
pub use types::{BuilderResponse, BuilderStatus};
