//! Throughput Meter
//!
//! Event rate tracking as a total count plus 1/5/15 minute exponentially
//! weighted moving averages. EWMA ticks run on a fixed five second cadence
//! and are caught up lazily on both mark and read, so rates decay during
//! idle stretches as well.

use super::clock::Clock;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

const TICK_INTERVAL_NANOS: u64 = 5_000_000_000;

/// One exponentially weighted moving average over a fixed tick interval.
///
/// The stored rate is events per nanosecond; `rate()` scales to per-second.
/// `tick()` is only ever driven by the single winner of the owning meter's
/// catch-up CAS, so the unsynchronized read-modify-write is safe.
struct Ewma {
    alpha: f64,
    uncounted: AtomicU64,
    rate_bits: AtomicU64,
    initialized: AtomicBool,
}

impl Ewma {
    fn new(alpha: f64) -> Self {
        Self {
            alpha,
            uncounted: AtomicU64::new(0),
            rate_bits: AtomicU64::new(0f64.to_bits()),
            initialized: AtomicBool::new(false),
        }
    }

    /// Window alphas: 1 - e^(-interval / 60s / minutes).
    fn one_minute() -> Self {
        Self::new(1.0 - (-5.0f64 / 60.0).exp())
    }

    fn five_minute() -> Self {
        Self::new(1.0 - (-5.0f64 / 60.0 / 5.0).exp())
    }

    fn fifteen_minute() -> Self {
        Self::new(1.0 - (-5.0f64 / 60.0 / 15.0).exp())
    }

    fn update(&self, n: u64) {
        self.uncounted.fetch_add(n, Ordering::Relaxed);
    }

    fn tick(&self) {
        let count = self.uncounted.swap(0, Ordering::Relaxed);
        let instant_rate = count as f64 / TICK_INTERVAL_NANOS as f64;
        if self.initialized.load(Ordering::Relaxed) {
            let old = f64::from_bits(self.rate_bits.load(Ordering::Relaxed));
            let new = old + self.alpha * (instant_rate - old);
            self.rate_bits.store(new.to_bits(), Ordering::Relaxed);
        } else {
            self.rate_bits.store(instant_rate.to_bits(), Ordering::Relaxed);
            self.initialized.store(true, Ordering::Relaxed);
        }
    }

    /// Current rate in events per second.
    fn rate(&self) -> f64 {
        f64::from_bits(self.rate_bits.load(Ordering::Relaxed)) * 1e9
    }
}

/// Measures event throughput.
pub struct Meter {
    count: AtomicU64,
    start_tick: u64,
    last_tick: AtomicU64,
    m1: Ewma,
    m5: Ewma,
    m15: Ewma,
    clock: Arc<dyn Clock>,
}

impl Meter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let start_tick = clock.tick_nanos();
        Self {
            count: AtomicU64::new(0),
            start_tick,
            last_tick: AtomicU64::new(start_tick),
            m1: Ewma::one_minute(),
            m5: Ewma::five_minute(),
            m15: Ewma::fifteen_minute(),
            clock,
        }
    }

    /// Record one event.
    pub fn mark(&self) {
        self.mark_n(1);
    }

    /// Record `n` events at once.
    pub fn mark_n(&self, n: u64) {
        self.tick_if_needed();
        self.count.fetch_add(n, Ordering::Relaxed);
        self.m1.update(n);
        self.m5.update(n);
        self.m15.update(n);
    }

    /// Total events ever recorded.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Lifetime average rate in events per second.
    pub fn mean_rate(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            return 0.0;
        }
        let elapsed = self.clock.tick_nanos().saturating_sub(self.start_tick) as f64;
        if elapsed == 0.0 {
            return 0.0;
        }
        count as f64 / elapsed * 1e9
    }

    pub fn one_minute_rate(&self) -> f64 {
        self.tick_if_needed();
        self.m1.rate()
    }

    pub fn five_minute_rate(&self) -> f64 {
        self.tick_if_needed();
        self.m5.rate()
    }

    pub fn fifteen_minute_rate(&self) -> f64 {
        self.tick_if_needed();
        self.m15.rate()
    }

    pub fn snapshot(&self) -> MeterSnapshot {
        MeterSnapshot {
            count: self.count(),
            mean_rate: self.mean_rate(),
            m1_rate: self.one_minute_rate(),
            m5_rate: self.five_minute_rate(),
            m15_rate: self.fifteen_minute_rate(),
        }
    }

    /// Run any EWMA ticks that have become due since the last call. The CAS
    /// picks a single winner so each elapsed interval is applied exactly
    /// once no matter how many threads race here.
    fn tick_if_needed(&self) {
        let old_tick = self.last_tick.load(Ordering::Relaxed);
        let new_tick = self.clock.tick_nanos();
        let age = new_tick.saturating_sub(old_tick);
        if age > TICK_INTERVAL_NANOS {
            let aligned = new_tick - age % TICK_INTERVAL_NANOS;
            if self
                .last_tick
                .compare_exchange(old_tick, aligned, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                for _ in 0..age / TICK_INTERVAL_NANOS {
                    self.m1.tick();
                    self.m5.tick();
                    self.m15.tick();
                }
            }
        }
    }
}

impl fmt::Debug for Meter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Meter")
            .field("count", &self.count())
            .finish_non_exhaustive()
    }
}

/// Point-in-time meter reading; rates are events per second.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MeterSnapshot {
    pub count: u64,
    pub mean_rate: f64,
    pub m1_rate: f64,
    pub m5_rate: f64,
    pub m15_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::clock::ManualClock;

    #[test]
    fn test_count_accumulates() {
        let meter = Meter::new(Arc::new(ManualClock::new()));
        meter.mark();
        meter.mark_n(4);
        assert_eq!(meter.count(), 5);
    }

    #[test]
    fn test_mean_rate_over_elapsed_time() {
        let clock = Arc::new(ManualClock::new());
        let meter = Meter::new(clock.clone());
        meter.mark_n(10);
        clock.advance_secs(5);
        assert!((meter.mean_rate() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_first_tick_sets_the_instant_rate() {
        let clock = Arc::new(ManualClock::new());
        let meter = Meter::new(clock.clone());
        meter.mark_n(3);

        // One full five second interval has elapsed: 3 events / 5s = 0.6/s.
        clock.advance_secs(6);
        assert!((meter.one_minute_rate() - 0.6).abs() < 1e-9);
        assert!((meter.five_minute_rate() - 0.6).abs() < 1e-9);
        assert!((meter.fifteen_minute_rate() - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_rates_decay_while_idle() {
        let clock = Arc::new(ManualClock::new());
        let meter = Meter::new(clock.clone());
        meter.mark_n(3);
        clock.advance_secs(6);
        assert!((meter.one_minute_rate() - 0.6).abs() < 1e-9);

        // Twelve more empty intervals multiply the one minute rate by
        // e^(-1): 0.6/e ~ 0.22072766. The slower windows decay by
        // e^(-12/60) and e^(-12/180) over the same span.
        clock.advance_secs(60);
        assert!((meter.one_minute_rate() - 0.22072766).abs() < 1e-6);
        assert!((meter.five_minute_rate() - 0.49123845).abs() < 1e-6);
        assert!((meter.fifteen_minute_rate() - 0.56130419).abs() < 1e-6);
    }

    #[test]
    fn test_zero_marks_zero_rates() {
        let clock = Arc::new(ManualClock::new());
        let meter = Meter::new(clock.clone());
        clock.advance_secs(30);
        assert_eq!(meter.mean_rate(), 0.0);
        assert_eq!(meter.one_minute_rate(), 0.0);
    }
}
