//! Graphite Sink Integration Tests

use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use vitals::metrics::MetricRegistry;
use vitals::report::{GraphiteSink, MetricSink, ScheduledReporter};

/// Accept one connection and read it to EOF.
fn capture_one_batch(listener: TcpListener) -> tokio::task::JoinHandle<String> {
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut received = String::new();
        socket.read_to_string(&mut received).await.unwrap();
        received
    })
}

#[tokio::test]
async fn test_pushes_rendered_batch_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = capture_one_batch(listener);

    let registry = MetricRegistry::new();
    registry.counter("cache.hits").unwrap().inc_by(42);
    registry.gauge("queue depth", || 7i64).unwrap();

    let sink = GraphiteSink::new(addr.ip().to_string(), addr.port()).prefixed("app");
    sink.report(&registry.snapshot()).await.unwrap();

    let received = server.await.unwrap();
    let lines: Vec<&str> = received.lines().collect();
    assert_eq!(lines.len(), 2, "unexpected batch: {:?}", received);
    // Gauges render before counters; whitespace never reaches the wire.
    assert!(lines[0].starts_with("app.queue-depth.value 7 "));
    assert!(lines[1].starts_with("app.cache.hits.count 42 "));
    for line in lines {
        assert_eq!(line.split(' ').count(), 3, "malformed line: {}", line);
    }
}

#[tokio::test]
async fn test_scheduled_reporter_delivers_batches() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = capture_one_batch(listener);

    let registry = Arc::new(MetricRegistry::new());
    registry.counter("ticks").unwrap().inc();

    let sink = GraphiteSink::new(addr.ip().to_string(), addr.port());
    let mut reporter = ScheduledReporter::new(registry, Arc::new(sink));
    reporter.start(Duration::from_millis(30)).unwrap();

    let received = server.await.unwrap();
    reporter.stop().await;
    assert!(received.contains("ticks.count 1 "), "batch: {:?}", received);
}

#[tokio::test]
async fn test_connection_failure_is_an_error_for_that_tick() {
    let registry = MetricRegistry::new();
    registry.counter("c").unwrap().inc();

    // Bind then drop to get a port with nothing listening.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let sink = GraphiteSink::new(addr.ip().to_string(), addr.port())
        .timeouts(Duration::from_millis(500), Duration::from_millis(500));
    assert!(sink.report(&registry.snapshot()).await.is_err());
}

#[tokio::test]
async fn test_empty_snapshot_skips_the_connection() {
    let registry = MetricRegistry::new();

    // 192.0.2.0/24 is reserved for documentation; nothing answers there.
    // An empty snapshot must return before any connection is attempted.
    let sink = GraphiteSink::new("192.0.2.1".to_string(), 2003)
        .timeouts(Duration::from_millis(100), Duration::from_millis(100));
    sink.report(&registry.snapshot()).await.unwrap();
}
