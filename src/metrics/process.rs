//! Process and host memory gauges backed by `sysinfo`.

use super::registry::MetricRegistry;
use super::types::GaugeValue;
use crate::error::MetricsError;
use std::sync::{Arc, Mutex};
use sysinfo::System;
use tracing::debug;

/// Register the standard memory gauge set.
///
/// Host gauges report bytes from the OS; the two `memory.process.*` gauges
/// report this process's resident and virtual sizes. All five share one
/// `System` so a single report tick refreshes the OS view once per gauge
/// read, not once per registry.
pub fn register_memory_gauges(registry: &MetricRegistry) -> Result<(), MetricsError> {
    let system = Arc::new(Mutex::new(System::new()));

    let sys = system.clone();
    registry.gauge("memory.total", move || {
        read_system(&sys, |s| s.total_memory())
    })?;

    let sys = system.clone();
    registry.gauge("memory.used", move || {
        read_system(&sys, |s| s.used_memory())
    })?;

    let sys = system.clone();
    registry.gauge("memory.free", move || {
        read_system(&sys, |s| s.free_memory())
    })?;

    let sys = system.clone();
    registry.gauge("memory.process.resident", move || {
        read_process(&sys, |p| p.memory())
    })?;

    registry.gauge("memory.process.virtual", move || {
        read_process(&system, |p| p.virtual_memory())
    })?;

    Ok(())
}

fn read_system(system: &Mutex<System>, read: impl Fn(&System) -> u64) -> GaugeValue {
    match system.lock() {
        Ok(mut sys) => {
            sys.refresh_memory();
            GaugeValue::from(read(&sys))
        }
        Err(_) => GaugeValue::None,
    }
}

fn read_process(system: &Mutex<System>, read: impl Fn(&sysinfo::Process) -> u64) -> GaugeValue {
    let pid = match sysinfo::get_current_pid() {
        Ok(pid) => pid,
        Err(e) => {
            debug!("cannot resolve current pid: {}", e);
            return GaugeValue::None;
        }
    };
    match system.lock() {
        Ok(mut sys) => {
            sys.refresh_process(pid);
            sys.process(pid)
                .map(|p| GaugeValue::from(read(p)))
                .unwrap_or(GaugeValue::None)
        }
        Err(_) => GaugeValue::None,
    }
}
