//! Monitoring Manager
//!
//! Wires the registry, scheduled reporters and query endpoint together from
//! one configuration.

use crate::config::Config;
use crate::metrics::{register_memory_gauges, MetricRegistry};
use crate::report::{GraphiteSink, JsonLogSink, ScheduledReporter};
use crate::server::{MonitoringServer, ProcThreadDump};
use crate::Result;
use anyhow::bail;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Owns the whole monitoring stack for one process.
///
/// Construction registers the standard memory gauges; `start` brings up
/// whichever reporters and the query endpoint the configuration enables.
pub struct MonitoringManager {
    registry: Arc<MetricRegistry>,
    reporters: Vec<ScheduledReporter>,
    server_handle: Option<JoinHandle<()>>,
    config: Config,
    started: bool,
}

impl MonitoringManager {
    pub fn new(config: Config) -> Result<Self> {
        let registry = Arc::new(MetricRegistry::new());
        register_memory_gauges(&registry)?;

        Ok(Self {
            registry,
            reporters: Vec::new(),
            server_handle: None,
            config,
            started: false,
        })
    }

    /// Handle for registering and updating application metrics.
    pub fn registry(&self) -> Arc<MetricRegistry> {
        self.registry.clone()
    }

    /// Start the configured reporters and the query endpoint.
    pub fn start(&mut self) -> Result<()> {
        if self.started {
            bail!("monitoring manager already started");
        }

        if let Some((host, port)) = self.config.graphite.endpoint() {
            let sink = GraphiteSink::new(host, port)
                .prefixed(self.config.graphite.prefix.clone())
                .timeouts(
                    self.config.graphite.connect_timeout,
                    self.config.graphite.write_timeout,
                );
            let mut reporter = ScheduledReporter::new(self.registry.clone(), Arc::new(sink));
            reporter.start(self.config.graphite.interval)?;
            self.reporters.push(reporter);
        } else {
            info!("Graphite reporting disabled");
        }

        if self.config.log.enabled {
            let sink = JsonLogSink::new().channel(self.config.log.channel.clone());
            let mut reporter = ScheduledReporter::new(self.registry.clone(), Arc::new(sink));
            reporter.start(self.config.log.interval)?;
            self.reporters.push(reporter);
        }

        if self.config.http.enabled {
            let server = MonitoringServer::new(
                self.config.http.bind_addr,
                self.registry.clone(),
                Arc::new(ProcThreadDump::new()),
            );
            self.server_handle = Some(tokio::spawn(async move {
                if let Err(e) = server.start().await {
                    error!("Monitoring server failed: {}", e);
                }
            }));
        }

        self.started = true;
        Ok(())
    }

    /// Flush every reporter once, outside the schedules.
    pub async fn report_now(&self) -> Result<()> {
        for reporter in &self.reporters {
            reporter.report_now().await?;
        }
        Ok(())
    }

    /// Stop reporters and the query endpoint. Idempotent.
    pub async fn stop(&mut self) {
        for reporter in &mut self.reporters {
            reporter.stop().await;
        }
        self.reporters.clear();

        if let Some(handle) = self.server_handle.take() {
            handle.abort();
            info!("Monitoring server stopped");
        }
        self.started = false;
    }
}

impl Drop for MonitoringManager {
    fn drop(&mut self) {
        // Reporter tasks end on their own when the stop channels drop.
        if let Some(handle) = self.server_handle.take() {
            handle.abort();
        }
    }
}
