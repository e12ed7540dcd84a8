//! Metrics emission and exposition.
//!
//! # Responsibilities
//! - Define the sink every component emits through
//! - Record emissions in memory for assertions
//! - Forward emissions to the `metrics` facade and expose them for Prometheus
//!
//! # Metrics
//! - `gauge.<producer>.<key>` (gauge): one per producer key per metrics tick
//! - `worker_loop` (timer): one per loop iteration, tagged `loop_name` and `result`
//! - `system.run` (timer): one per supervisor run, tagged `result`
//!
//! # Design Decisions
//! - Tags are `key:value` strings, translated to labels only at the Prometheus edge
//! - `rate` is a sampling hint; the Prometheus facade records every emission

use std::fmt;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Kind of metric emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Gauge,
    Timer,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Gauge => "gauge",
            MetricKind::Timer => "timer",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Destination for supervisor telemetry.
///
/// Implementations must be safe to call from many tasks at once: services may
/// emit through the same sink as the supervisor.
pub trait MetricsSink: Send + Sync {
    /// Emit a gauge value.
    fn gauge(&self, name: &str, value: f64, tags: &[String], rate: f64);

    /// Emit a timer value.
    fn timing(&self, name: &str, value: Duration, tags: &[String], rate: f64);
}

/// A single recorded emission.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricCall {
    pub kind: MetricKind,
    pub name: String,
    /// Gauge value, or timer duration in milliseconds.
    pub value: f64,
    pub tags: Vec<String>,
    pub rate: f64,
}

/// In-memory sink that records every emission in order.
#[derive(Debug, Default)]
pub struct MemorySink {
    calls: Mutex<Vec<MetricCall>>,
}

impl MemorySink {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all emissions so far, in emission order.
    pub fn calls(&self) -> Vec<MetricCall> {
        match self.calls.lock() {
            Ok(calls) => calls.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Emissions with the given name.
    pub fn calls_named(&self, name: &str) -> Vec<MetricCall> {
        self.calls().into_iter().filter(|c| c.name == name).collect()
    }

    fn push(&self, call: MetricCall) {
        tracing::trace!(kind = %call.kind, name = %call.name, value = call.value, "Metric recorded");
        match self.calls.lock() {
            Ok(mut calls) => calls.push(call),
            Err(poisoned) => poisoned.into_inner().push(call),
        }
    }
}

impl MetricsSink for MemorySink {
    fn gauge(&self, name: &str, value: f64, tags: &[String], rate: f64) {
        self.push(MetricCall {
            kind: MetricKind::Gauge,
            name: name.to_string(),
            value,
            tags: tags.to_vec(),
            rate,
        });
    }

    fn timing(&self, name: &str, value: Duration, tags: &[String], rate: f64) {
        self.push(MetricCall {
            kind: MetricKind::Timer,
            name: name.to_string(),
            value: value.as_secs_f64() * 1000.0,
            tags: tags.to_vec(),
            rate,
        });
    }
}

/// Sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl MetricsSink for NoopSink {
    fn gauge(&self, _name: &str, _value: f64, _tags: &[String], _rate: f64) {}

    fn timing(&self, _name: &str, _value: Duration, _tags: &[String], _rate: f64) {}
}

/// Sink forwarding to the global `metrics` recorder.
///
/// Gauges become `gauge!` values and timers become `histogram!` samples in seconds.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrometheusSink;

impl MetricsSink for PrometheusSink {
    fn gauge(&self, name: &str, value: f64, tags: &[String], _rate: f64) {
        ::metrics::gauge!(name.to_string(), tags_to_labels(tags)).set(value);
    }

    fn timing(&self, name: &str, value: Duration, tags: &[String], _rate: f64) {
        ::metrics::histogram!(name.to_string(), tags_to_labels(tags)).record(value.as_secs_f64());
    }
}

/// Convert `key:value` tags into metric labels. A bare tag becomes `tag=<tag>`.
pub fn tags_to_labels(tags: &[String]) -> Vec<::metrics::Label> {
    tags.iter()
        .map(|tag| match tag.split_once(':') {
            Some((key, value)) => ::metrics::Label::new(key.to_string(), value.to_string()),
            None => ::metrics::Label::new("tag", tag.clone()),
        })
        .collect()
}

/// Install the Prometheus exporter with an HTTP listener on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), metrics_exporter_prometheus::BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Prometheus exporter listening");
    Ok(())
}
