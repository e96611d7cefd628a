//! Monitoring Endpoint Integration Tests

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use vitals::metrics::MetricRegistry;
use vitals::server::{MonitoringServer, ProcThreadDump};

fn test_server() -> MonitoringServer {
    let registry = Arc::new(MetricRegistry::new());
    registry.counter("requests.count").unwrap().inc_by(2);
    registry
        .timer("request.duration")
        .unwrap()
        .update(Duration::from_millis(250));

    MonitoringServer::new(
        "127.0.0.1:8686".parse().unwrap(),
        registry,
        Arc::new(ProcThreadDump::new()),
    )
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_metrics_document_is_nested_by_kind() {
    let app = test_server().router();

    let request = Request::builder()
        .uri("/monitoring/metrics")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        "must-revalidate,no-cache,no-store"
    );

    let doc: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert!(doc["version"].is_string());
    assert_eq!(doc["counters"]["requests.count"]["count"], 2);
    assert!(doc["timers"]["request.duration"]["mean_rate"].is_number());
    assert_eq!(doc["timers"]["request.duration"]["duration_units"], "seconds");
}

#[tokio::test]
async fn test_metrics_subpaths_are_served() {
    let app = test_server().router();

    let request = Request::builder()
        .uri("/monitoring/metrics/anything/below")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let doc: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(doc["counters"]["requests.count"]["count"], 2);
}

#[tokio::test]
async fn test_pretty_parameter_formats_output() {
    let app = test_server().router();

    let request = Request::builder()
        .uri("/monitoring/metrics?pretty=true")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_string(response).await;
    assert!(body.contains("\n  "), "expected indented output: {}", body);
}

#[tokio::test]
async fn test_unknown_paths_get_404_with_empty_body() {
    let app = test_server().router();

    let request = Request::builder()
        .uri("/monitoring/other")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_string(response).await.is_empty());
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_thread_dump_lists_threads() {
    let app = test_server().router();

    let request = Request::builder()
        .uri("/monitoring/threads")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/plain; charset=utf-8"
    );

    let body = body_string(response).await;
    assert!(body.contains("thread "), "unexpected dump: {}", body);
}
