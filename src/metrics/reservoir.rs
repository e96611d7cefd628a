//! Sample Reservoirs
//!
//! Bounded samples backing histograms. The uniform reservoir represents the
//! full history evenly; the decaying reservoir biases toward recent values
//! so long-running histograms stay responsive without unbounded memory.

use super::clock::Clock;
use rand::Rng;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Default number of samples held by either reservoir.
pub const DEFAULT_RESERVOIR_SIZE: usize = 1028;

/// Default decay factor for [`ExpDecayReservoir`], weighting roughly the
/// last five minutes of activity.
pub const DEFAULT_DECAY_ALPHA: f64 = 0.015;

const RESCALE_INTERVAL_NANOS: u64 = 60 * 60 * 1_000_000_000;

/// A bounded sample of recorded values.
pub trait Reservoir: Send + Sync {
    /// Record one value.
    fn update(&self, value: i64);

    /// Copy of the current sample contents, in no particular order.
    fn values(&self) -> Vec<i64>;

    /// Number of values currently held.
    fn size(&self) -> usize;
}

/// Uniform random sample over the full history (Vitter's algorithm R).
///
/// Every value ever recorded has an equal chance of being in the sample.
pub struct UniformReservoir {
    values: Mutex<Vec<i64>>,
    count: AtomicU64,
    capacity: usize,
}

impl UniformReservoir {
    pub fn new(capacity: usize) -> Self {
        Self {
            values: Mutex::new(Vec::with_capacity(capacity)),
            count: AtomicU64::new(0),
            capacity,
        }
    }
}

impl Default for UniformReservoir {
    fn default() -> Self {
        Self::new(DEFAULT_RESERVOIR_SIZE)
    }
}

impl Reservoir for UniformReservoir {
    fn update(&self, value: i64) {
        let seen = self.count.fetch_add(1, Ordering::Relaxed) + 1;
        if let Ok(mut values) = self.values.lock() {
            if values.len() < self.capacity {
                values.push(value);
            } else {
                let slot = rand::thread_rng().gen_range(0..seen);
                if (slot as usize) < self.capacity {
                    values[slot as usize] = value;
                }
            }
        }
    }

    fn values(&self) -> Vec<i64> {
        self.values
            .lock()
            .map(|values| values.clone())
            .unwrap_or_default()
    }

    fn size(&self) -> usize {
        self.values.lock().map(|values| values.len()).unwrap_or(0)
    }
}

/// Exponentially decaying reservoir biased toward recent values.
///
/// Holds a fixed-size priority sample in which newer values carry
/// exponentially larger priorities, so snapshot statistics track roughly the
/// last five minutes of activity. Priorities are rescaled hourly to keep the
/// exponent in range; rescaling may drop samples whose weight has decayed
/// to zero.
pub struct ExpDecayReservoir {
    state: Mutex<DecayState>,
    clock: Arc<dyn Clock>,
    alpha: f64,
    capacity: usize,
}

/// Sample map keyed by priority bits. Priorities are always positive finite
/// (or +inf) floats, so their bit patterns order the same way the numbers do.
struct DecayState {
    samples: BTreeMap<u64, i64>,
    count: u64,
    start_tick: u64,
    next_rescale_tick: u64,
}

impl ExpDecayReservoir {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_params(DEFAULT_RESERVOIR_SIZE, DEFAULT_DECAY_ALPHA, clock)
    }

    pub fn with_params(capacity: usize, alpha: f64, clock: Arc<dyn Clock>) -> Self {
        let start_tick = clock.tick_nanos();
        Self {
            state: Mutex::new(DecayState {
                samples: BTreeMap::new(),
                count: 0,
                start_tick,
                next_rescale_tick: start_tick + RESCALE_INTERVAL_NANOS,
            }),
            clock,
            alpha,
            capacity,
        }
    }
}

impl Reservoir for ExpDecayReservoir {
    fn update(&self, value: i64) {
        let now = self.clock.tick_nanos();
        if let Ok(mut state) = self.state.lock() {
            state.rescale_if_due(now, self.alpha);

            let elapsed_secs = now.saturating_sub(state.start_tick) as f64 / 1e9;
            let weight = (self.alpha * elapsed_secs).exp();
            let priority = weight / rand::thread_rng().gen::<f64>();
            let key = priority.to_bits();

            state.count += 1;
            if state.count <= self.capacity as u64 {
                state.samples.insert(key, value);
            } else if let Some(&lowest) = state.samples.keys().next() {
                if lowest < key {
                    state.samples.insert(key, value);
                    if state.samples.len() > self.capacity {
                        state.samples.remove(&lowest);
                    }
                }
            } else {
                state.samples.insert(key, value);
            }
        }
    }

    fn values(&self) -> Vec<i64> {
        self.state
            .lock()
            .map(|state| state.samples.values().copied().collect())
            .unwrap_or_default()
    }

    fn size(&self) -> usize {
        self.state
            .lock()
            .map(|state| state.samples.len())
            .unwrap_or(0)
    }
}

impl DecayState {
    /// Move the landmark forward and scale every priority down so exponents
    /// keep fitting in an f64 over long uptimes.
    fn rescale_if_due(&mut self, now: u64, alpha: f64) {
        if now < self.next_rescale_tick {
            return;
        }

        let old_start = self.start_tick;
        self.start_tick = now;
        self.next_rescale_tick = now + RESCALE_INTERVAL_NANOS;

        let factor = (-alpha * (now.saturating_sub(old_start) as f64 / 1e9)).exp();
        if factor == 0.0 {
            self.samples.clear();
        } else {
            let old = std::mem::take(&mut self.samples);
            for (bits, value) in old {
                let scaled = f64::from_bits(bits) * factor;
                if scaled > 0.0 {
                    self.samples.insert(scaled.to_bits(), value);
                }
            }
        }
        self.count = self.samples.len() as u64;
    }
}
