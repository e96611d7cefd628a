//! Call Timer
//!
//! A timer couples a duration histogram (nanosecond scale, decaying
//! reservoir) with a call-rate meter, so one instrument answers both "how
//! long" and "how often".

use super::clock::Clock;
use super::histogram::{Histogram, HistogramSnapshot};
use super::meter::{Meter, MeterSnapshot};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub struct Timer {
    durations: Histogram,
    rate: Meter,
    clock: Arc<dyn Clock>,
}

impl Timer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            durations: Histogram::new(clock.clone()),
            rate: Meter::new(clock.clone()),
            clock,
        }
    }

    /// Record one completed call.
    pub fn update(&self, elapsed: Duration) {
        let nanos = i64::try_from(elapsed.as_nanos()).unwrap_or(i64::MAX);
        self.durations.update(nanos);
        self.rate.mark();
    }

    /// Start timing; the returned guard records the elapsed time when it is
    /// dropped, on normal return and on unwind alike.
    pub fn time(&self) -> TimerContext<'_> {
        TimerContext {
            timer: self,
            start_tick: self.clock.tick_nanos(),
        }
    }

    /// Time one closure.
    pub fn time_fn<T>(&self, f: impl FnOnce() -> T) -> T {
        let _guard = self.time();
        f()
    }

    /// Total number of recorded calls.
    pub fn count(&self) -> u64 {
        self.durations.count()
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot::from_parts(self.durations.snapshot(), self.rate.snapshot())
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("count", &self.count())
            .finish_non_exhaustive()
    }
}

/// Guard returned by [`Timer::time`]. Dropping it records the measurement.
pub struct TimerContext<'a> {
    timer: &'a Timer,
    start_tick: u64,
}

impl TimerContext<'_> {
    /// Stop explicitly and return the measured duration.
    pub fn stop(self) -> Duration {
        let elapsed = self.elapsed();
        self.timer.update(elapsed);
        std::mem::forget(self);
        elapsed
    }

    fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.timer.clock.tick_nanos().saturating_sub(self.start_tick))
    }
}

impl Drop for TimerContext<'_> {
    fn drop(&mut self) {
        self.timer.update(self.elapsed());
    }
}

/// Point-in-time timer reading: duration statistics in nanoseconds plus
/// rate statistics in calls per second. Report sinks convert both.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TimerSnapshot {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub stddev: f64,
    pub median: f64,
    pub p75: f64,
    pub p95: f64,
    pub p98: f64,
    pub p99: f64,
    pub p999: f64,
    pub mean_rate: f64,
    pub m1_rate: f64,
    pub m5_rate: f64,
    pub m15_rate: f64,
}

impl TimerSnapshot {
    pub fn from_parts(duration: HistogramSnapshot, rate: MeterSnapshot) -> Self {
        Self {
            count: duration.count,
            min: duration.min as f64,
            max: duration.max as f64,
            mean: duration.mean,
            stddev: duration.stddev,
            median: duration.median,
            p75: duration.p75,
            p95: duration.p95,
            p98: duration.p98,
            p99: duration.p99,
            p999: duration.p999,
            mean_rate: rate.mean_rate,
            m1_rate: rate.m1_rate,
            m5_rate: rate.m5_rate,
            m15_rate: rate.m15_rate,
        }
    }
}
