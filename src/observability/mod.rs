//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! executor / negotiator / clients
//!     → logging.rs (structured events via tracing, one span per batch)
//!     → metrics.rs (counters and histograms via the metrics facade)
//! ```

pub mod logging;
pub mod metrics;
