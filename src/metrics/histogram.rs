//! Value Distribution Histogram

use super::clock::Clock;
use super::reservoir::{ExpDecayReservoir, Reservoir};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Records a distribution of values in a bounded reservoir.
///
/// `count` is the total number of updates ever recorded; snapshot statistics
/// are computed over whatever the reservoir currently holds, so the two can
/// legitimately disagree.
pub struct Histogram {
    reservoir: Box<dyn Reservoir>,
    count: AtomicU64,
}

impl Histogram {
    /// Histogram over an exponentially decaying reservoir, the default for
    /// long-running processes.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_reservoir(Box::new(ExpDecayReservoir::new(clock)))
    }

    pub fn with_reservoir(reservoir: Box<dyn Reservoir>) -> Self {
        Self {
            reservoir,
            count: AtomicU64::new(0),
        }
    }

    /// Record one value.
    pub fn update(&self, value: i64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.reservoir.update(value);
    }

    /// Total number of values ever recorded.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> HistogramSnapshot {
        HistogramSnapshot::from_values(self.count(), self.reservoir.values())
    }
}

impl fmt::Debug for Histogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Histogram")
            .field("count", &self.count())
            .finish_non_exhaustive()
    }
}

/// Point-in-time distribution statistics.
///
/// All fields are zero when the reservoir is empty.
#[derive(Debug, Clone, Serialize)]
pub struct HistogramSnapshot {
    pub count: u64,
    pub min: i64,
    pub max: i64,
    pub mean: f64,
    pub stddev: f64,
    pub median: f64,
    pub p75: f64,
    pub p95: f64,
    pub p98: f64,
    pub p99: f64,
    pub p999: f64,
}

impl HistogramSnapshot {
    pub fn from_values(count: u64, mut values: Vec<i64>) -> Self {
        values.sort_unstable();

        if values.is_empty() {
            return Self {
                count,
                min: 0,
                max: 0,
                mean: 0.0,
                stddev: 0.0,
                median: 0.0,
                p75: 0.0,
                p95: 0.0,
                p98: 0.0,
                p99: 0.0,
                p999: 0.0,
            };
        }

        let n = values.len() as f64;
        let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
        let stddev = if values.len() > 1 {
            let variance = values
                .iter()
                .map(|&v| {
                    let delta = v as f64 - mean;
                    delta * delta
                })
                .sum::<f64>()
                / (n - 1.0);
            variance.sqrt()
        } else {
            0.0
        };

        Self {
            count,
            min: values[0],
            max: values[values.len() - 1],
            mean,
            stddev,
            median: quantile(&values, 0.5),
            p75: quantile(&values, 0.75),
            p95: quantile(&values, 0.95),
            p98: quantile(&values, 0.98),
            p99: quantile(&values, 0.99),
            p999: quantile(&values, 0.999),
        }
    }
}

/// Interpolated quantile over a sorted sample, `q` in `[0, 1]`.
fn quantile(sorted: &[i64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let pos = q * (sorted.len() + 1) as f64;
    let index = pos as usize;
    if index < 1 {
        return sorted[0] as f64;
    }
    if index >= sorted.len() {
        return sorted[sorted.len() - 1] as f64;
    }
    let lower = sorted[index - 1] as f64;
    let upper = sorted[index] as f64;
    lower + (pos - pos.floor()) * (upper - lower)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::reservoir::UniformReservoir;

    fn uniform_histogram() -> Histogram {
        Histogram::with_reservoir(Box::new(UniformReservoir::new(2048)))
    }

    #[test]
    fn test_empty_snapshot_is_all_zeros() {
        let snapshot = uniform_histogram().snapshot();
        assert_eq!(snapshot.count, 0);
        assert_eq!(snapshot.min, 0);
        assert_eq!(snapshot.max, 0);
        assert_eq!(snapshot.mean, 0.0);
        assert_eq!(snapshot.median, 0.0);
    }

    #[test]
    fn test_statistics_over_known_values() {
        let histogram = uniform_histogram();
        for v in 1..=100 {
            histogram.update(v);
        }

        let snapshot = histogram.snapshot();
        assert_eq!(snapshot.count, 100);
        assert_eq!(snapshot.min, 1);
        assert_eq!(snapshot.max, 100);
        assert!((snapshot.mean - 50.5).abs() < 1e-9);
        // Sample stddev of 1..=100 is sqrt(841.67) ~ 29.011
        assert!((snapshot.stddev - 29.011).abs() < 0.01);
        assert!((snapshot.median - 50.5).abs() < 1e-9);
        assert!((snapshot.p75 - 75.75).abs() < 1e-9);
    }

    #[test]
    fn test_identical_values_have_zero_spread() {
        let histogram = uniform_histogram();
        for _ in 0..10 {
            histogram.update(42);
        }

        let snapshot = histogram.snapshot();
        assert_eq!(snapshot.stddev, 0.0);
        assert_eq!(snapshot.min, 42);
        assert_eq!(snapshot.max, 42);
        assert_eq!(snapshot.median, 42.0);
    }

    #[test]
    fn test_count_outlives_reservoir_occupancy() {
        let histogram = Histogram::with_reservoir(Box::new(UniformReservoir::new(16)));
        for v in 0..1_000 {
            histogram.update(v);
        }
        assert_eq!(histogram.count(), 1_000);
        assert_eq!(histogram.snapshot().count, 1_000);
    }

    #[test]
    fn test_single_value_quantiles() {
        let histogram = uniform_histogram();
        histogram.update(7);
        let snapshot = histogram.snapshot();
        assert_eq!(snapshot.median, 7.0);
        assert_eq!(snapshot.p999, 7.0);
        assert_eq!(snapshot.stddev, 0.0);
    }
}
