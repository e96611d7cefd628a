//! Structured-Log Sink
//!
//! Emits one flat JSON line per tick on its own writer, kept separate from
//! the application's tracing output so downstream log shippers can scrape
//! the channel on its own.

use super::{MetricSink, TimeUnit};
use crate::metrics::RegistrySnapshot;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::io::Write;
use std::sync::Mutex;
use tracing::error;

/// One JSON object per tick: every metric-name+facet flattened to a scalar,
/// plus a `timestamp` in epoch milliseconds.
///
/// Keys replace `.` with `-` because the downstream consumer treats dots as
/// path separators. Counters and gauges use the bare sanitized name; other
/// kinds append `-<facet>`. Render or write failures go to the diagnostic
/// log and never bubble up to the scheduler.
pub struct JsonLogSink {
    channel: String,
    rate_unit: TimeUnit,
    duration_unit: TimeUnit,
    writer: Mutex<Box<dyn Write + Send>>,
}

impl JsonLogSink {
    /// Sink writing to stdout on the default `metrics` channel.
    pub fn new() -> Self {
        Self::with_writer(Box::new(std::io::stdout()))
    }

    pub fn with_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            channel: "metrics".to_string(),
            rate_unit: TimeUnit::Seconds,
            duration_unit: TimeUnit::Seconds,
            writer: Mutex::new(writer),
        }
    }

    pub fn channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
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

    fn render(&self, snapshot: &RegistrySnapshot) -> Map<String, Value> {
        let mut fields = Map::new();

        for (name, value) in &snapshot.gauges {
            fields.insert(sanitize(name), value.to_json());
        }

        for (name, counter) in &snapshot.counters {
            fields.insert(sanitize(name), Value::from(counter.count));
        }

        for (name, h) in &snapshot.histograms {
            let base = sanitize(name);
            fields.insert(facet_key(&base, "count"), Value::from(h.count));
            fields.insert(facet_key(&base, "min"), Value::from(h.min));
            fields.insert(facet_key(&base, "max"), Value::from(h.max));
            fields.insert(facet_key(&base, "mean"), Value::from(h.mean));
            fields.insert(facet_key(&base, "stddev"), Value::from(h.stddev));
            fields.insert(facet_key(&base, "p50"), Value::from(h.median));
            fields.insert(facet_key(&base, "p75"), Value::from(h.p75));
            fields.insert(facet_key(&base, "p95"), Value::from(h.p95));
            fields.insert(facet_key(&base, "p98"), Value::from(h.p98));
            fields.insert(facet_key(&base, "p99"), Value::from(h.p99));
            fields.insert(facet_key(&base, "p999"), Value::from(h.p999));
        }

        for (name, m) in &snapshot.meters {
            let base = sanitize(name);
            fields.insert(facet_key(&base, "count"), Value::from(m.count));
            for (facet, rate) in [
                ("mean_rate", m.mean_rate),
                ("m1_rate", m.m1_rate),
                ("m5_rate", m.m5_rate),
                ("m15_rate", m.m15_rate),
            ] {
                fields.insert(
                    facet_key(&base, facet),
                    Value::from(self.rate_unit.convert_rate(rate)),
                );
            }
        }

        for (name, t) in &snapshot.timers {
            let base = sanitize(name);
            fields.insert(facet_key(&base, "count"), Value::from(t.count));
            for (facet, nanos) in [
                ("min", t.min),
                ("max", t.max),
                ("mean", t.mean),
                ("stddev", t.stddev),
                ("p50", t.median),
                ("p75", t.p75),
                ("p95", t.p95),
                ("p98", t.p98),
                ("p99", t.p99),
                ("p999", t.p999),
            ] {
                fields.insert(
                    facet_key(&base, facet),
                    Value::from(self.duration_unit.convert_duration(nanos)),
                );
            }
            for (facet, rate) in [
                ("mean_rate", t.mean_rate),
                ("m1_rate", t.m1_rate),
                ("m5_rate", t.m5_rate),
                ("m15_rate", t.m15_rate),
            ] {
                fields.insert(
                    facet_key(&base, facet),
                    Value::from(self.rate_unit.convert_rate(rate)),
                );
            }
        }

        fields.insert("timestamp".to_string(), Value::from(snapshot.timestamp_millis));
        fields
    }
}

impl Default for JsonLogSink {
    fn default() -> Self {
        Self::new()
    }
}

fn sanitize(name: &str) -> String {
    name.replace('.', "-")
}

fn facet_key(base: &str, facet: &str) -> String {
    format!("{}-{}", base, facet)
}

#[async_trait]
impl MetricSink for JsonLogSink {
    fn name(&self) -> &str {
        &self.channel
    }

    async fn report(&self, snapshot: &RegistrySnapshot) -> anyhow::Result<()> {
        let fields = self.render(snapshot);

        let line = match serde_json::to_string(&Value::Object(fields)) {
            Ok(line) => line,
            Err(e) => {
                error!(channel = %self.channel, error = %e, "cannot serialize metrics line");
                return Ok(());
            }
        };

        let mut writer = match self.writer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = writeln!(writer, "{}", line) {
            error!(channel = %self.channel, error = %e, "cannot write metrics line");
            return Ok(());
        }
        if let Err(e) = writer.flush() {
            error!(channel = %self.channel, error = %e, "cannot flush metrics line");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricRegistry;
    use std::io;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn take_string(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_line_flattens_names_with_dashes() {
        let registry = MetricRegistry::new();
        registry.counter("requests.count").unwrap().inc_by(2);
        registry.gauge("queue.depth", || 3i64).unwrap();

        let buf = SharedBuf::default();
        let sink = JsonLogSink::with_writer(Box::new(buf.clone()));
        sink.report(&registry.snapshot()).await.unwrap();

        let output = buf.take_string();
        assert!(output.ends_with('\n'));
        assert_eq!(output.matches('\n').count(), 1);

        let doc: Value = serde_json::from_str(output.trim_end()).unwrap();
        assert_eq!(doc["requests-count"], 2);
        assert_eq!(doc["queue-depth"], 3);
        assert!(doc["timestamp"].as_u64().unwrap() > 0);
        assert!(doc.as_object().unwrap().keys().all(|k| !k.contains('.')));
    }

    #[tokio::test]
    async fn test_negative_deltas_and_bool_gauges_land_in_the_line() {
        let registry = MetricRegistry::new();
        let counter = registry.counter("requests.count").unwrap();
        counter.inc();
        counter.inc_by(2);
        counter.inc_by(-1);
        registry.gauge("status.ok", || true).unwrap();

        let buf = SharedBuf::default();
        let sink = JsonLogSink::with_writer(Box::new(buf.clone()));
        sink.report(&registry.snapshot()).await.unwrap();

        let doc: Value = serde_json::from_str(buf.take_string().trim_end()).unwrap();
        assert_eq!(doc["requests-count"], 2);
        assert_eq!(doc["status-ok"], true);
    }

    #[tokio::test]
    async fn test_timer_facets_are_converted_to_seconds() {
        use crate::metrics::TimerSnapshot;

        let mut snapshot = RegistrySnapshot::default();
        snapshot.timers.insert(
            "request.duration".into(),
            TimerSnapshot {
                count: 1,
                min: 2_000_000_000.0,
                max: 2_000_000_000.0,
                mean: 2_000_000_000.0,
                stddev: 0.0,
                median: 2_000_000_000.0,
                p75: 2_000_000_000.0,
                p95: 2_000_000_000.0,
                p98: 2_000_000_000.0,
                p99: 2_000_000_000.0,
                p999: 2_000_000_000.0,
                mean_rate: 0.5,
                m1_rate: 0.5,
                m5_rate: 0.5,
                m15_rate: 0.5,
            },
        );

        let buf = SharedBuf::default();
        let sink = JsonLogSink::with_writer(Box::new(buf.clone()));
        sink.report(&snapshot).await.unwrap();

        let doc: Value = serde_json::from_str(buf.take_string().trim_end()).unwrap();
        assert_eq!(doc["request-duration-count"], 1);
        assert_eq!(doc["request-duration-min"], 2.0);
        assert_eq!(doc["request-duration-mean_rate"], 0.5);
    }

    #[tokio::test]
    async fn test_successive_timestamps_do_not_decrease() {
        let registry = MetricRegistry::new();
        registry.counter("ticks").unwrap();

        let buf = SharedBuf::default();
        let sink = JsonLogSink::with_writer(Box::new(buf.clone()));
        sink.report(&registry.snapshot()).await.unwrap();
        sink.report(&registry.snapshot()).await.unwrap();

        let output = buf.take_string();
        let stamps: Vec<u64> = output
            .lines()
            .map(|line| {
                let doc: Value = serde_json::from_str(line).unwrap();
                doc["timestamp"].as_u64().unwrap()
            })
            .collect();
        assert_eq!(stamps.len(), 2);
        assert!(stamps[1] >= stamps[0]);
    }

    #[test]
    fn test_channel_names_the_sink() {
        let sink = JsonLogSink::new().channel("telemetry");
        assert_eq!(sink.name(), "telemetry");
    }
}
