//! Transaction execution engine.
//!
//! # Data Flow
//! ```text
//! Vec<TransactionIntent> (from the builder)
//!     → executor.rs (per intent: gas price → sign → broadcast → bounded settle)
//!         ↳ nonce.rs (one NonceSequencer per batch)
//!     → IntentOutcome::{Settled, Skipped, Fatal}
//!     → BatchReport / last Receipt, or ExecutionError
//! ```

pub mod executor;
pub mod intent;
pub mod nonce;

pub use executor::{
    BatchReport, ExecutionError, ExecutionResult, ExecutionSettings, IntentOutcome,
    SkippedIntent, TransactionExecutor,
};
pub use intent::{Criticality, TransactionIntent};
pub use nonce::NonceSequencer;
