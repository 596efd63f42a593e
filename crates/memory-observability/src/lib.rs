//! Structured logging and in-process metrics, the ambient observability
//! stack shared by every other crate in the workspace.

pub mod logging;
pub mod metrics;

pub use logging::{init as init_logging, LogFormat, LoggingConfig};
pub use metrics::{EngineMetrics, MetricsSnapshot};
