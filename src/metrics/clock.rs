//! Time Sources
//!
//! Meters, timers and decaying reservoirs read time through the [`Clock`]
//! trait so rate math stays deterministic under test.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Time source for rate and decay bookkeeping.
///
/// `tick_nanos` is monotonic and only meaningful as a difference between two
/// readings from the same clock; `wall_millis` is wall-clock epoch time.
pub trait Clock: Send + Sync {
    /// Monotonic reading in nanoseconds.
    fn tick_nanos(&self) -> u64;

    /// Wall-clock milliseconds since the Unix epoch.
    fn wall_millis(&self) -> u64;
}

/// Default clock backed by `Instant` and `SystemTime`.
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn tick_nanos(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }

    fn wall_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Manually advanced clock for deterministic tests.
///
/// Starts at zero and only moves when told to.
#[derive(Default)]
pub struct ManualClock {
    nanos: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the clock by the given number of nanoseconds.
    pub fn advance_nanos(&self, nanos: u64) {
        self.nanos.fetch_add(nanos, Ordering::SeqCst);
    }

    /// Advance the clock by whole seconds.
    pub fn advance_secs(&self, secs: u64) {
        self.advance_nanos(secs * 1_000_000_000);
    }
}

impl Clock for ManualClock {
    fn tick_nanos(&self) -> u64 {
        self.nanos.load(Ordering::SeqCst)
    }

    fn wall_millis(&self) -> u64 {
        self.nanos.load(Ordering::SeqCst) / 1_000_000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let first = clock.tick_nanos();
        let second = clock.tick_nanos();
        assert!(second >= first);
    }

    #[test]
    fn test_manual_clock_advances_on_demand() {
        let clock = ManualClock::new();
        assert_eq!(clock.tick_nanos(), 0);

        clock.advance_secs(2);
        assert_eq!(clock.tick_nanos(), 2_000_000_000);
        assert_eq!(clock.wall_millis(), 2_000);

        clock.advance_nanos(500);
        assert_eq!(clock.tick_nanos(), 2_000_000_500);
    }
}
