//! Scheduled reporting: sinks that push registry snapshots somewhere.

pub mod graphite;
pub mod json_log;
pub mod scheduled;

pub use graphite::GraphiteSink;
pub use json_log::JsonLogSink;
pub use scheduled::ScheduledReporter;

use crate::metrics::RegistrySnapshot;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Destination for registry snapshots.
///
/// A sink renders one snapshot per call; scheduling, error isolation and
/// shutdown live in [`ScheduledReporter`].
#[async_trait]
pub trait MetricSink: Send + Sync {
    /// Short sink identifier used in log lines and error messages.
    fn name(&self) -> &str;

    /// Render and deliver one snapshot.
    async fn report(&self, snapshot: &RegistrySnapshot) -> anyhow::Result<()>;
}

/// Unit rates and durations are converted to before rendering.
///
/// Internally rates are per-second and durations are nanoseconds; each sink
/// picks its own output units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
    Minutes,
}

impl TimeUnit {
    fn nanos(&self) -> f64 {
        match self {
            TimeUnit::Nanoseconds => 1.0,
            TimeUnit::Microseconds => 1_000.0,
            TimeUnit::Milliseconds => 1_000_000.0,
            TimeUnit::Seconds => 1_000_000_000.0,
            TimeUnit::Minutes => 60.0 * 1_000_000_000.0,
        }
    }

    /// Convert a per-second rate into events per this unit.
    pub fn convert_rate(&self, per_second: f64) -> f64 {
        per_second * (self.nanos() / 1_000_000_000.0)
    }

    /// Convert a duration in nanoseconds into this unit.
    pub fn convert_duration(&self, nanos: f64) -> f64 {
        nanos / self.nanos()
    }

    /// Lowercase unit name as it appears in report documents.
    pub fn label(&self) -> &'static str {
        match self {
            TimeUnit::Nanoseconds => "nanoseconds",
            TimeUnit::Microseconds => "microseconds",
            TimeUnit::Milliseconds => "milliseconds",
            TimeUnit::Seconds => "seconds",
            TimeUnit::Minutes => "minutes",
        }
    }
}
