//! Prometheus metrics and structured logging for finboard.
//!
//! - Prometheus metrics for fetches, cache, rate limiting and feeds
//! - Structured logging with tracing (JSON in production)

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::{encode_metrics, Metrics};
