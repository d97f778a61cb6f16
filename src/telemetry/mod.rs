//! Telemetry module for logging and metrics.
//!
//! Provides:
//! - Logging configuration and initialization
//! - Counters summarising a replay run

mod logging;
mod metrics;

pub use logging::{LogConfig, init_logging};
pub use metrics::{Counter, Metrics};
