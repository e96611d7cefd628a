//! Metric instruments and the registry that holds them.

pub mod clock;
pub mod histogram;
pub mod meter;
pub mod process;
pub mod registry;
pub mod reservoir;
pub mod timer;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use histogram::{Histogram, HistogramSnapshot};
pub use meter::{Meter, MeterSnapshot};
pub use process::register_memory_gauges;
pub use registry::{Metric, MetricRegistry, RegistrySnapshot};
pub use reservoir::{ExpDecayReservoir, Reservoir, UniformReservoir};
pub use timer::{Timer, TimerContext, TimerSnapshot};
pub use types::{Counter, CounterSnapshot, Gauge, GaugeValue};
