//! Metric Registry
//!
//! Thread-safe map of named metrics plus whole-registry snapshots.

use super::clock::{Clock, SystemClock};
use super::histogram::{Histogram, HistogramSnapshot};
use super::meter::{Meter, MeterSnapshot};
use super::timer::{Timer, TimerSnapshot};
use super::types::{Counter, CounterSnapshot, Gauge, GaugeValue};
use crate::error::MetricsError;
use serde::Serialize;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A named metric held by the registry.
///
/// Variants are `Arc`ed so callers keep cheap handles while the registry
/// owns the canonical entry.
#[derive(Debug, Clone)]
pub enum Metric {
    Counter(Arc<Counter>),
    Gauge(Arc<Gauge>),
    Histogram(Arc<Histogram>),
    Meter(Arc<Meter>),
    Timer(Arc<Timer>),
}

impl Metric {
    /// Human-readable kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Metric::Counter(_) => "counter",
            Metric::Gauge(_) => "gauge",
            Metric::Histogram(_) => "histogram",
            Metric::Meter(_) => "meter",
            Metric::Timer(_) => "timer",
        }
    }
}

/// Thread-safe registry of named metrics.
///
/// Names are dot-segmented by convention (`service.requests.count`) and
/// unique across all metric kinds.
pub struct MetricRegistry {
    metrics: RwLock<HashMap<String, Metric>>,
    clock: Arc<dyn Clock>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock::new()))
    }

    /// Registry whose meters, timers and reservoirs read the given clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            metrics: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// The clock shared by every instrument this registry creates.
    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    /// Register a pre-built metric under a unique name.
    pub fn register(&self, name: impl Into<String>, metric: Metric) -> Result<(), MetricsError> {
        let name = name.into();
        let mut metrics = self.write_lock();
        if metrics.contains_key(&name) {
            return Err(MetricsError::DuplicateMetric(name));
        }
        metrics.insert(name, metric);
        Ok(())
    }

    /// Register a gauge computed by `read` on every report.
    ///
    /// Gauges have no get-or-create form: two closures cannot be compared
    /// for sameness, so a duplicate name is always an error.
    pub fn gauge<F, V>(&self, name: impl Into<String>, read: F) -> Result<(), MetricsError>
    where
        F: Fn() -> V + Send + Sync + 'static,
        V: Into<GaugeValue>,
    {
        self.register(name, Metric::Gauge(Arc::new(Gauge::new(read))))
    }

    /// Get or create the counter registered under `name`.
    pub fn counter(&self, name: impl Into<String>) -> Result<Arc<Counter>, MetricsError> {
        self.get_or_create(
            name.into(),
            |metric| match metric {
                Metric::Counter(c) => Some(c.clone()),
                _ => None,
            },
            |_| Metric::Counter(Arc::new(Counter::new())),
            |metric| match metric {
                Metric::Counter(c) => c.clone(),
                _ => unreachable!("inserted variant is a counter"),
            },
        )
    }

    /// Get or create the histogram registered under `name`, backed by a
    /// decaying reservoir.
    pub fn histogram(&self, name: impl Into<String>) -> Result<Arc<Histogram>, MetricsError> {
        self.get_or_create(
            name.into(),
            |metric| match metric {
                Metric::Histogram(h) => Some(h.clone()),
                _ => None,
            },
            |clock| Metric::Histogram(Arc::new(Histogram::new(clock))),
            |metric| match metric {
                Metric::Histogram(h) => h.clone(),
                _ => unreachable!("inserted variant is a histogram"),
            },
        )
    }

    /// Get or create the meter registered under `name`.
    pub fn meter(&self, name: impl Into<String>) -> Result<Arc<Meter>, MetricsError> {
        self.get_or_create(
            name.into(),
            |metric| match metric {
                Metric::Meter(m) => Some(m.clone()),
                _ => None,
            },
            |clock| Metric::Meter(Arc::new(Meter::new(clock))),
            |metric| match metric {
                Metric::Meter(m) => m.clone(),
                _ => unreachable!("inserted variant is a meter"),
            },
        )
    }

    /// Get or create the timer registered under `name`.
    pub fn timer(&self, name: impl Into<String>) -> Result<Arc<Timer>, MetricsError> {
        self.get_or_create(
            name.into(),
            |metric| match metric {
                Metric::Timer(t) => Some(t.clone()),
                _ => None,
            },
            |clock| Metric::Timer(Arc::new(Timer::new(clock))),
            |metric| match metric {
                Metric::Timer(t) => t.clone(),
                _ => unreachable!("inserted variant is a timer"),
            },
        )
    }

    /// Look up a metric by name.
    pub fn lookup(&self, name: &str) -> Option<Metric> {
        self.read_lock().get(name).cloned()
    }

    /// Remove a metric; returns whether one was registered.
    pub fn remove(&self, name: &str) -> bool {
        self.write_lock().remove(name).is_some()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read_lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.read_lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_lock().is_empty()
    }

    /// Snapshot every registered metric.
    ///
    /// Metric handles are cloned under a short read lock and each metric is
    /// read outside it, so no lock spans the actual snapshotting. Updates
    /// racing the snapshot may or may not be observed; each individual
    /// metric reading is self-consistent.
    pub fn snapshot(&self) -> RegistrySnapshot {
        let metrics: Vec<(String, Metric)> = {
            let map = self.read_lock();
            map.iter().map(|(name, metric)| (name.clone(), metric.clone())).collect()
        };

        let mut snapshot = RegistrySnapshot {
            timestamp_millis: self.clock.wall_millis(),
            ..Default::default()
        };
        for (name, metric) in metrics {
            match metric {
                Metric::Counter(c) => {
                    snapshot.counters.insert(name, CounterSnapshot { count: c.count() });
                }
                Metric::Gauge(g) => {
                    snapshot.gauges.insert(name, g.value());
                }
                Metric::Histogram(h) => {
                    snapshot.histograms.insert(name, h.snapshot());
                }
                Metric::Meter(m) => {
                    snapshot.meters.insert(name, m.snapshot());
                }
                Metric::Timer(t) => {
                    snapshot.timers.insert(name, t.snapshot());
                }
            }
        }
        snapshot
    }

    /// Shared get-or-create path: fast read probe, then a write-locked
    /// entry check so two racing creators end up with the same instance.
    fn get_or_create<T>(
        &self,
        name: String,
        as_kind: impl Fn(&Metric) -> Option<T>,
        build: impl FnOnce(Arc<dyn Clock>) -> Metric,
        unwrap_new: impl FnOnce(&Metric) -> T,
    ) -> Result<T, MetricsError> {
        {
            let metrics = self.read_lock();
            if let Some(metric) = metrics.get(&name) {
                return as_kind(metric).ok_or_else(|| MetricsError::TypeMismatch {
                    name,
                    existing: metric.kind(),
                });
            }
        }

        let mut metrics = self.write_lock();
        match metrics.entry(name.clone()) {
            Entry::Occupied(entry) => as_kind(entry.get()).ok_or_else(|| MetricsError::TypeMismatch {
                name,
                existing: entry.get().kind(),
            }),
            Entry::Vacant(entry) => {
                let metric = build(self.clock.clone());
                let handle = unwrap_new(&metric);
                entry.insert(metric);
                Ok(handle)
            }
        }
    }

    // A poisoned lock only means some other thread panicked mid-update; the
    // map itself is still valid, so keep serving it.
    fn read_lock(&self) -> RwLockReadGuard<'_, HashMap<String, Metric>> {
        match self.metrics.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_lock(&self) -> RwLockWriteGuard<'_, HashMap<String, Metric>> {
        match self.metrics.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of every metric in a registry, grouped by kind.
///
/// Names are kept sorted so report output is deterministic. The timestamp
/// is taken from the registry clock when the snapshot begins, so every sink
/// reporting one snapshot stamps it the same.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RegistrySnapshot {
    pub timestamp_millis: u64,
    pub gauges: BTreeMap<String, GaugeValue>,
    pub counters: BTreeMap<String, CounterSnapshot>,
    pub histograms: BTreeMap<String, HistogramSnapshot>,
    pub meters: BTreeMap<String, MeterSnapshot>,
    pub timers: BTreeMap<String, TimerSnapshot>,
}

impl RegistrySnapshot {
    /// Total number of metrics across all kinds.
    pub fn len(&self) -> usize {
        self.gauges.len()
            + self.counters.len()
            + self.histograms.len()
            + self.meters.len()
            + self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
