//! Observability subsystem
//!
//! - Structured logging (JSON lines, deterministic field ordering)
//! - Deterministic metrics (monotonic counters only)
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No side effects on execution
//! 3. No async or background threads
//! 4. Deterministic output

mod logger;
mod metrics;

pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
