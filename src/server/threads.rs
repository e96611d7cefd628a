//! Thread Dump Provider
//!
//! Textual dump of the process's threads for the query endpoint.

use crate::Result;

/// Source of thread dumps served by the monitoring endpoint.
pub trait ThreadDump: Send + Sync {
    fn capture(&self) -> Result<String>;
}

/// Reads thread names and states from `/proc/self/task`.
///
/// Rust has no portable stack-walking facility for foreign threads, so the
/// dump lists each thread's id, name and scheduler state rather than a call
/// stack. Platforms without procfs report an error, which the endpoint
/// surfaces as a server error.
pub struct ProcThreadDump;

impl ProcThreadDump {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ProcThreadDump {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "linux")]
impl ThreadDump for ProcThreadDump {
    fn capture(&self) -> Result<String> {
        use anyhow::Context;

        let entries = std::fs::read_dir("/proc/self/task")
            .context("cannot list /proc/self/task")?;

        let mut tids: Vec<u64> = Vec::new();
        for entry in entries {
            let entry = entry.context("cannot read /proc/self/task entry")?;
            if let Some(tid) = entry.file_name().to_str().and_then(|s| s.parse().ok()) {
                tids.push(tid);
            }
        }
        tids.sort_unstable();

        let mut dump = format!("{} threads\n\n", tids.len());
        for tid in tids {
            // A thread may exit between the listing and reading its files.
            if let Some(line) = thread_line(tid) {
                dump.push_str(&line);
            }
        }
        Ok(dump)
    }
}

#[cfg(not(target_os = "linux"))]
impl ThreadDump for ProcThreadDump {
    fn capture(&self) -> Result<String> {
        anyhow::bail!("thread dump requires /proc, only available on linux")
    }
}

#[cfg(target_os = "linux")]
fn thread_line(tid: u64) -> Option<String> {
    let comm = std::fs::read_to_string(format!("/proc/self/task/{}/comm", tid)).ok()?;
    let status = std::fs::read_to_string(format!("/proc/self/task/{}/status", tid)).ok()?;
    let state = status
        .lines()
        .find_map(|line| line.strip_prefix("State:"))
        .map(str::trim)
        .unwrap_or("unknown");
    Some(format!("thread {} \"{}\" state {}\n", tid, comm.trim(), state))
}
