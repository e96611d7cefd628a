//! Simple Instruments
//!
//! Counters and on-demand gauges, the two metric kinds with no internal
//! history.

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

/// A signed counter that can be incremented and decremented from any thread.
///
/// All operations are lock-free; overflow wraps.
#[derive(Debug, Default)]
pub struct Counter {
    count: AtomicI64,
}

impl Counter {
    pub fn new() -> Self {
        Self {
            count: AtomicI64::new(0),
        }
    }

    /// Increment by one.
    pub fn inc(&self) {
        self.inc_by(1);
    }

    /// Decrement by one.
    pub fn dec(&self) {
        self.inc_by(-1);
    }

    /// Apply a signed delta.
    pub fn inc_by(&self, delta: i64) {
        self.count.fetch_add(delta, Ordering::Relaxed);
    }

    /// Current value.
    pub fn count(&self) -> i64 {
        self.count.load(Ordering::Relaxed)
    }
}

/// Point-in-time counter reading.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CounterSnapshot {
    pub count: i64,
}

/// Value produced by a gauge closure.
///
/// Only `Int` and `Float` have a numeric reading for wire formats that carry
/// plain numbers; the other variants appear in JSON documents only.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GaugeValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    None,
}

impl GaugeValue {
    /// Numeric reading, if the value has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            GaugeValue::Int(v) => Some(*v as f64),
            GaugeValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// JSON rendering. Non-finite floats become `null`.
    pub fn to_json(&self) -> Value {
        match self {
            GaugeValue::Int(v) => Value::from(*v),
            GaugeValue::Float(v) => Value::from(*v),
            GaugeValue::Bool(v) => Value::from(*v),
            GaugeValue::Text(v) => Value::from(v.clone()),
            GaugeValue::None => Value::Null,
        }
    }
}

impl From<i64> for GaugeValue {
    fn from(v: i64) -> Self {
        GaugeValue::Int(v)
    }
}

impl From<u64> for GaugeValue {
    fn from(v: u64) -> Self {
        GaugeValue::Int(v as i64)
    }
}

impl From<usize> for GaugeValue {
    fn from(v: usize) -> Self {
        GaugeValue::Int(v as i64)
    }
}

impl From<f64> for GaugeValue {
    fn from(v: f64) -> Self {
        GaugeValue::Float(v)
    }
}

impl From<bool> for GaugeValue {
    fn from(v: bool) -> Self {
        GaugeValue::Bool(v)
    }
}

impl From<String> for GaugeValue {
    fn from(v: String) -> Self {
        GaugeValue::Text(v)
    }
}

impl From<&str> for GaugeValue {
    fn from(v: &str) -> Self {
        GaugeValue::Text(v.to_string())
    }
}

/// A gauge computes its value on demand from a captured closure.
///
/// The closure runs on every read; nothing is cached between reads.
pub struct Gauge {
    read: Box<dyn Fn() -> GaugeValue + Send + Sync>,
}

impl Gauge {
    pub fn new<F, V>(read: F) -> Self
    where
        F: Fn() -> V + Send + Sync + 'static,
        V: Into<GaugeValue>,
    {
        Self {
            read: Box::new(move || read().into()),
        }
    }

    /// Invoke the closure and return the current value.
    pub fn value(&self) -> GaugeValue {
        (self.read)()
    }
}

impl fmt::Debug for Gauge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gauge").finish_non_exhaustive()
    }
}
