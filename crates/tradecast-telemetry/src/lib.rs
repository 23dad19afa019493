//! Prometheus metrics and structured logging for tradecast.
//!
//! - Prometheus metrics for ingestion outcomes, stream lifecycle and
//!   data channel traffic
//! - Structured JSON logging with tracing

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
