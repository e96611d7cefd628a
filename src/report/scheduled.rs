//! Scheduled Reporter
//!
//! Drives one sink on a fixed interval from a background task.

use super::MetricSink;
use crate::error::MetricsError;
use crate::metrics::MetricRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Periodically snapshots a registry and hands the snapshot to a sink.
///
/// One reporter drives one sink; run several reporters for several sinks so
/// a slow destination never delays the others. A failed report is logged and
/// the schedule keeps running. Dropping the reporter without calling
/// [`stop`](Self::stop) also ends the background task: the stop channel's
/// sender is dropped with it.
pub struct ScheduledReporter {
    registry: Arc<MetricRegistry>,
    sink: Arc<dyn MetricSink>,
    handle: Option<JoinHandle<()>>,
    stop_tx: Option<watch::Sender<bool>>,
}

impl ScheduledReporter {
    pub fn new(registry: Arc<MetricRegistry>, sink: Arc<dyn MetricSink>) -> Self {
        Self {
            registry,
            sink,
            handle: None,
            stop_tx: None,
        }
    }

    /// Start the background schedule.
    pub fn start(&mut self, interval: Duration) -> Result<(), MetricsError> {
        if self.handle.is_some() {
            return Err(MetricsError::AlreadyStarted(self.sink.name().to_string()));
        }

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let registry = self.registry.clone();
        let sink = self.sink.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick fires immediately; consume it so the first
            // report carries a full interval of activity.
            ticker.tick().await;

            loop {
                tokio::select! {
                    biased;
                    _ = stop_rx.changed() => {
                        debug!(sink = sink.name(), "reporter stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        let snapshot = registry.snapshot();
                        if let Err(e) = sink.report(&snapshot).await {
                            warn!(sink = sink.name(), error = %e, "report tick failed");
                        }
                    }
                }
            }
        });

        info!(
            sink = self.sink.name(),
            interval = %humantime::format_duration(interval),
            "scheduled reporter started"
        );
        self.handle = Some(handle);
        self.stop_tx = Some(stop_tx);
        Ok(())
    }

    /// Stop the schedule and wait for the in-flight tick, if any.
    ///
    /// Safe to call when not started, and safe to call twice.
    pub async fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(true);
        }
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    warn!(sink = self.sink.name(), error = %e, "reporter task ended abnormally");
                }
            }
            info!(sink = self.sink.name(), "scheduled reporter stopped");
        }
    }

    /// Snapshot and report once, outside the schedule.
    ///
    /// Unlike scheduled ticks, failures propagate to the caller.
    pub async fn report_now(&self) -> anyhow::Result<()> {
        let snapshot = self.registry.snapshot();
        self.sink.report(&snapshot).await
    }

    pub fn is_started(&self) -> bool {
        self.handle.is_some()
    }
}
