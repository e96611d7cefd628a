//! Monitoring Errors
//!
//! Typed errors for registry and reporter lifecycle failures. Application
//! level flows wrap these in `anyhow` with added context.

use thiserror::Error;

/// Errors raised by the metric registry and the reporter lifecycle.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// A metric with this name is already registered.
    #[error("metric '{0}' is already registered")]
    DuplicateMetric(String),

    /// The name is taken by a metric of a different kind.
    #[error("metric '{name}' is already registered as a {existing}")]
    TypeMismatch {
        name: String,
        existing: &'static str,
    },

    /// The reporter already has a running schedule.
    #[error("reporter '{0}' is already started")]
    AlreadyStarted(String),
}
