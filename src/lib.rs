//! Vitals Library
//!
//! In-process monitoring for long-running services: a thread-safe metric
//! registry (counters, gauges, histograms, meters, timers), scheduled
//! reporters pushing to Graphite and to a structured JSON log channel, and
//! an on-demand HTTP endpoint serving the current registry and a thread
//! dump.

pub mod config;
pub mod error;
pub mod manager;
pub mod metrics;
pub mod report;
pub mod server;

pub use config::Config;
pub use error::MetricsError;
pub use manager::MonitoringManager;
pub use metrics::MetricRegistry;

/// Common result type for the monitoring stack
pub type Result<T> = anyhow::Result<T>;
