//! Graphite Push Sink
//!
//! Renders snapshots into the plaintext line protocol and pushes the batch
//! over TCP.

use super::{MetricSink, TimeUnit};
use crate::metrics::{GaugeValue, RegistrySnapshot};
use anyhow::Context;
use async_trait::async_trait;
use bytes::BytesMut;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

/// Pushes `<prefix>.<name>.<facet> <value> <epoch-seconds>` lines to a
/// Graphite-compatible endpoint.
///
/// Each report opens a fresh connection, writes the whole batch and shuts
/// the socket down, so there is no keep-alive state to go stale between
/// ticks. A failed tick loses that tick's data; nothing is buffered or
/// retried.
pub struct GraphiteSink {
    host: String,
    port: u16,
    prefix: String,
    rate_unit: TimeUnit,
    duration_unit: TimeUnit,
    connect_timeout: Duration,
    write_timeout: Duration,
}

impl GraphiteSink {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            prefix: String::new(),
            rate_unit: TimeUnit::Seconds,
            duration_unit: TimeUnit::Milliseconds,
            connect_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(5),
        }
    }

    /// Prepend `prefix.` to every metric path.
    pub fn prefixed(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn rates_as(mut self, unit: TimeUnit) -> Self {
        self.rate_unit = unit;
        self
    }

    pub fn durations_as(mut self, unit: TimeUnit) -> Self {
        self.duration_unit = unit;
        self
    }

    pub fn timeouts(mut self, connect: Duration, write: Duration) -> Self {
        self.connect_timeout = connect;
        self.write_timeout = write;
        self
    }

    /// Render the whole snapshot as one wire batch.
    fn render(&self, snapshot: &RegistrySnapshot, epoch_secs: u64) -> BytesMut {
        let mut batch = BytesMut::new();

        for (name, value) in &snapshot.gauges {
            // Only numeric gauges have a place in the line protocol.
            match value {
                GaugeValue::Int(v) => self.put_int(&mut batch, name, "value", *v, epoch_secs),
                GaugeValue::Float(v) if v.is_finite() => {
                    self.put_float(&mut batch, name, "value", *v, epoch_secs)
                }
                _ => {}
            }
        }

        for (name, counter) in &snapshot.counters {
            self.put_int(&mut batch, name, "count", counter.count, epoch_secs);
        }

        for (name, h) in &snapshot.histograms {
            self.put_int(&mut batch, name, "count", h.count as i64, epoch_secs);
            self.put_int(&mut batch, name, "min", h.min, epoch_secs);
            self.put_int(&mut batch, name, "max", h.max, epoch_secs);
            self.put_float(&mut batch, name, "mean", h.mean, epoch_secs);
            self.put_float(&mut batch, name, "stddev", h.stddev, epoch_secs);
            self.put_float(&mut batch, name, "p50", h.median, epoch_secs);
            self.put_float(&mut batch, name, "p75", h.p75, epoch_secs);
            self.put_float(&mut batch, name, "p95", h.p95, epoch_secs);
            self.put_float(&mut batch, name, "p98", h.p98, epoch_secs);
            self.put_float(&mut batch, name, "p99", h.p99, epoch_secs);
            self.put_float(&mut batch, name, "p999", h.p999, epoch_secs);
        }

        for (name, m) in &snapshot.meters {
            self.put_int(&mut batch, name, "count", m.count as i64, epoch_secs);
            self.put_rate(&mut batch, name, "mean_rate", m.mean_rate, epoch_secs);
            self.put_rate(&mut batch, name, "m1_rate", m.m1_rate, epoch_secs);
            self.put_rate(&mut batch, name, "m5_rate", m.m5_rate, epoch_secs);
            self.put_rate(&mut batch, name, "m15_rate", m.m15_rate, epoch_secs);
        }

        for (name, t) in &snapshot.timers {
            self.put_int(&mut batch, name, "count", t.count as i64, epoch_secs);
            self.put_duration(&mut batch, name, "min", t.min, epoch_secs);
            self.put_duration(&mut batch, name, "max", t.max, epoch_secs);
            self.put_duration(&mut batch, name, "mean", t.mean, epoch_secs);
            self.put_duration(&mut batch, name, "stddev", t.stddev, epoch_secs);
            self.put_duration(&mut batch, name, "p50", t.median, epoch_secs);
            self.put_duration(&mut batch, name, "p75", t.p75, epoch_secs);
            self.put_duration(&mut batch, name, "p95", t.p95, epoch_secs);
            self.put_duration(&mut batch, name, "p98", t.p98, epoch_secs);
            self.put_duration(&mut batch, name, "p99", t.p99, epoch_secs);
            self.put_duration(&mut batch, name, "p999", t.p999, epoch_secs);
            self.put_rate(&mut batch, name, "mean_rate", t.mean_rate, epoch_secs);
            self.put_rate(&mut batch, name, "m1_rate", t.m1_rate, epoch_secs);
            self.put_rate(&mut batch, name, "m5_rate", t.m5_rate, epoch_secs);
            self.put_rate(&mut batch, name, "m15_rate", t.m15_rate, epoch_secs);
        }

        batch
    }

    fn put_int(&self, batch: &mut BytesMut, name: &str, facet: &str, value: i64, epoch: u64) {
        let line = format!("{} {} {}\n", self.path(name, facet), value, epoch);
        batch.extend_from_slice(line.as_bytes());
    }

    fn put_float(&self, batch: &mut BytesMut, name: &str, facet: &str, value: f64, epoch: u64) {
        let line = format!("{} {:.2} {}\n", self.path(name, facet), value, epoch);
        batch.extend_from_slice(line.as_bytes());
    }

    fn put_rate(&self, batch: &mut BytesMut, name: &str, facet: &str, per_second: f64, epoch: u64) {
        self.put_float(batch, name, facet, self.rate_unit.convert_rate(per_second), epoch);
    }

    fn put_duration(&self, batch: &mut BytesMut, name: &str, facet: &str, nanos: f64, epoch: u64) {
        self.put_float(batch, name, facet, self.duration_unit.convert_duration(nanos), epoch);
    }

    // Graphite treats whitespace as the field separator, so none may survive
    // inside a path.
    fn path(&self, name: &str, facet: &str) -> String {
        let path = if self.prefix.is_empty() {
            format!("{}.{}", name, facet)
        } else {
            format!("{}.{}.{}", self.prefix, name, facet)
        };
        path.replace(char::is_whitespace, "-")
    }
}

#[async_trait]
impl MetricSink for GraphiteSink {
    fn name(&self) -> &str {
        "graphite"
    }

    async fn report(&self, snapshot: &RegistrySnapshot) -> anyhow::Result<()> {
        let epoch_secs = snapshot.timestamp_millis / 1000;
        let batch = self.render(snapshot, epoch_secs);
        if batch.is_empty() {
            return Ok(());
        }

        let mut stream = timeout(
            self.connect_timeout,
            TcpStream::connect((self.host.as_str(), self.port)),
        )
        .await
        .with_context(|| format!("connect to graphite at {}:{} timed out", self.host, self.port))?
        .with_context(|| format!("cannot connect to graphite at {}:{}", self.host, self.port))?;

        timeout(self.write_timeout, async {
            stream.write_all(&batch).await?;
            stream.shutdown().await
        })
        .await
        .context("graphite write timed out")?
        .context("graphite write failed")?;

        debug!(
            bytes = batch.len(),
            host = %self.host,
            port = self.port,
            "pushed graphite batch"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{CounterSnapshot, MeterSnapshot};

    #[test]
    fn test_render_one_line_per_facet() {
        let mut snapshot = RegistrySnapshot::default();
        snapshot
            .counters
            .insert("cache.hits".into(), CounterSnapshot { count: 42 });
        snapshot.gauges.insert("queue depth".into(), GaugeValue::Int(7));

        let sink = GraphiteSink::new("localhost", 2003).prefixed("app");
        let batch = sink.render(&snapshot, 1000);

        assert_eq!(
            std::str::from_utf8(&batch).unwrap(),
            "app.queue-depth.value 7 1000\napp.cache.hits.count 42 1000\n"
        );
    }

    #[test]
    fn test_floats_use_two_decimals() {
        let mut snapshot = RegistrySnapshot::default();
        snapshot.gauges.insert("load".into(), GaugeValue::Float(2.5));

        let sink = GraphiteSink::new("localhost", 2003);
        let batch = sink.render(&snapshot, 7);
        assert_eq!(std::str::from_utf8(&batch).unwrap(), "load.value 2.50 7\n");
    }

    #[test]
    fn test_meter_rates_converted_to_sink_unit() {
        let mut snapshot = RegistrySnapshot::default();
        snapshot.meters.insert(
            "events".into(),
            MeterSnapshot {
                count: 3,
                mean_rate: 1.0,
                m1_rate: 0.5,
                m5_rate: 0.25,
                m15_rate: 0.1,
            },
        );

        let sink = GraphiteSink::new("localhost", 2003).rates_as(TimeUnit::Minutes);
        let text = String::from_utf8(sink.render(&snapshot, 5).to_vec()).unwrap();

        assert!(text.contains("events.count 3 5\n"));
        assert!(text.contains("events.mean_rate 60.00 5\n"));
        assert!(text.contains("events.m1_rate 30.00 5\n"));
        assert!(text.contains("events.m15_rate 6.00 5\n"));
    }

    #[test]
    fn test_non_numeric_gauges_are_skipped() {
        let mut snapshot = RegistrySnapshot::default();
        snapshot.gauges.insert("build".into(), GaugeValue::Text("abc".into()));
        snapshot.gauges.insert("bad".into(), GaugeValue::Float(f64::NAN));

        let sink = GraphiteSink::new("localhost", 2003);
        assert!(sink.render(&snapshot, 1).is_empty());
    }
}
