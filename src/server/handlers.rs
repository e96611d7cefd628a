//! Monitoring Endpoint Handlers

use super::threads::ThreadDump;
use crate::metrics::{MetricRegistry, RegistrySnapshot};
use crate::report::TimeUnit;
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::error;

const CACHE_CONTROL_VALUE: &str = "must-revalidate,no-cache,no-store";

/// Shared state for the monitoring handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<MetricRegistry>,
    pub thread_dump: Arc<dyn ThreadDump>,
}

/// Query parameters for the metrics document.
#[derive(Debug, Deserialize)]
pub struct MetricsQuery {
    pub pretty: Option<String>,
}

impl MetricsQuery {
    fn is_pretty(&self) -> bool {
        self.pretty
            .as_deref()
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }
}

/// Serve the full registry as a JSON document, nested by metric kind.
pub async fn metrics_doc(
    State(state): State<AppState>,
    Query(query): Query<MetricsQuery>,
) -> Response {
    let doc = render_doc(&state.registry.snapshot());
    let body = if query.is_pretty() {
        serde_json::to_string_pretty(&doc)
    } else {
        serde_json::to_string(&doc)
    };

    match body {
        Ok(body) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "application/json"),
                (header::CACHE_CONTROL, CACHE_CONTROL_VALUE),
            ],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("cannot serialize metrics document: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Serve a plain-text dump of the process's threads.
pub async fn thread_dump_text(State(state): State<AppState>) -> Response {
    match state.thread_dump.capture() {
        Ok(dump) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
                (header::CACHE_CONTROL, CACHE_CONTROL_VALUE),
            ],
            dump,
        )
            .into_response(),
        Err(e) => {
            error!("thread dump failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("thread dump failed: {}", e),
            )
                .into_response()
        }
    }
}

/// Build the nested document: durations in seconds, rates per second,
/// metric names kept exactly as registered.
fn render_doc(snapshot: &RegistrySnapshot) -> Value {
    let duration_unit = TimeUnit::Seconds;

    let gauges: Map<String, Value> = snapshot
        .gauges
        .iter()
        .map(|(name, value)| (name.clone(), json!({ "value": value.to_json() })))
        .collect();

    let counters: Map<String, Value> = snapshot
        .counters
        .iter()
        .map(|(name, c)| (name.clone(), json!({ "count": c.count })))
        .collect();

    let histograms: Map<String, Value> = snapshot
        .histograms
        .iter()
        .map(|(name, h)| {
            (
                name.clone(),
                json!({
                    "count": h.count,
                    "max": h.max,
                    "mean": h.mean,
                    "min": h.min,
                    "p50": h.median,
                    "p75": h.p75,
                    "p95": h.p95,
                    "p98": h.p98,
                    "p99": h.p99,
                    "p999": h.p999,
                    "stddev": h.stddev,
                }),
            )
        })
        .collect();

    let meters: Map<String, Value> = snapshot
        .meters
        .iter()
        .map(|(name, m)| {
            // Rates are tracked per second, the document's native unit.
            (
                name.clone(),
                json!({
                    "count": m.count,
                    "m15_rate": m.m15_rate,
                    "m1_rate": m.m1_rate,
                    "m5_rate": m.m5_rate,
                    "mean_rate": m.mean_rate,
                    "units": "events/second",
                }),
            )
        })
        .collect();

    let timers: Map<String, Value> = snapshot
        .timers
        .iter()
        .map(|(name, t)| {
            (
                name.clone(),
                json!({
                    "count": t.count,
                    "max": duration_unit.convert_duration(t.max),
                    "mean": duration_unit.convert_duration(t.mean),
                    "min": duration_unit.convert_duration(t.min),
                    "p50": duration_unit.convert_duration(t.median),
                    "p75": duration_unit.convert_duration(t.p75),
                    "p95": duration_unit.convert_duration(t.p95),
                    "p98": duration_unit.convert_duration(t.p98),
                    "p99": duration_unit.convert_duration(t.p99),
                    "p999": duration_unit.convert_duration(t.p999),
                    "stddev": duration_unit.convert_duration(t.stddev),
                    "m15_rate": t.m15_rate,
                    "m1_rate": t.m1_rate,
                    "m5_rate": t.m5_rate,
                    "mean_rate": t.mean_rate,
                    "duration_units": "seconds",
                    "rate_units": "calls/second",
                }),
            )
        })
        .collect();

    json!({
        "version": env!("CARGO_PKG_VERSION"),
        "gauges": gauges,
        "counters": counters,
        "histograms": histograms,
        "meters": meters,
        "timers": timers,
    })
}
