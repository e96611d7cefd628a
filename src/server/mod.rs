//! On-Demand Query Endpoint
//!
//! Small axum server exposing the registry and a thread dump over HTTP.

mod handlers;
mod threads;

pub use handlers::AppState;
pub use threads::{ProcThreadDump, ThreadDump};

use crate::metrics::MetricRegistry;
use crate::Result;
use anyhow::Context;
use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// HTTP server for on-demand monitoring queries.
///
/// Serves `/monitoring/metrics` (JSON document of the whole registry,
/// `?pretty=true` supported) and `/monitoring/threads` (plain-text thread
/// dump). Sub-paths of either route are served the same as the route
/// itself; everything else is a 404 with an empty body.
pub struct MonitoringServer {
    bind_addr: SocketAddr,
    app_state: AppState,
}

impl MonitoringServer {
    pub fn new(
        bind_addr: SocketAddr,
        registry: Arc<MetricRegistry>,
        thread_dump: Arc<dyn ThreadDump>,
    ) -> Self {
        let app_state = AppState {
            registry,
            thread_dump,
        };

        Self {
            bind_addr,
            app_state,
        }
    }

    /// Bind and serve until the task is dropped or aborted.
    pub async fn start(self) -> Result<()> {
        let app = self.router();

        let listener = tokio::net::TcpListener::bind(self.bind_addr)
            .await
            .with_context(|| format!("Failed to bind monitoring server to {}", self.bind_addr))?;

        info!("Monitoring server listening on {}", self.bind_addr);

        axum::serve(listener, app)
            .await
            .context("Monitoring server error")?;

        Ok(())
    }

    /// The route table, exposed for in-process tests.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/monitoring/metrics", get(handlers::metrics_doc))
            .route("/monitoring/metrics/*rest", get(handlers::metrics_doc))
            .route("/monitoring/threads", get(handlers::thread_dump_text))
            .route("/monitoring/threads/*rest", get(handlers::thread_dump_text))
            .with_state(self.app_state.clone())
    }
}
