//! Logging and metrics wiring for the LocalLab server.

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogConfig, LogFormat, DEFAULT_LOG_FILTER};
pub use metrics::{init_metrics, metrics_handler, MetricsError};
