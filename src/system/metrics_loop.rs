//! Periodic collection of producer gauges.
//!
//! # Responsibilities
//! - Poll every producer once per tick, in registration order
//! - Emit one `gauge.<producer>.<key>` gauge per key
//! - Time each tick as a `worker_loop` timer tagged `loop_name:metric-loop`
//!
//! # Design Decisions
//! - A failing or panicking producer only loses its own gauges for that tick
//! - Failures show up as `result:failure` on the tick timer, never as a run error
//! - No producers, no loop

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::error::{TaskError, TaskResult};
use crate::observability::metrics::MetricsSink;
use crate::system::contracts::{GaugeTags, Gauges, MetricProducer};
use crate::worker::{run_loop, LoopConfig};

/// `loop_name` tag of the metrics loop timer.
pub const METRICS_LOOP_NAME: &str = "metric-loop";

/// Polls metric producers and emits their gauges.
pub struct MetricsLoop {
    producers: Vec<Arc<dyn MetricProducer>>,
    sink: Arc<dyn MetricsSink>,
}

impl MetricsLoop {
    pub fn new(producers: Vec<Arc<dyn MetricProducer>>, sink: Arc<dyn MetricsSink>) -> Self {
        Self { producers, sink }
    }

    /// Tick every `poll_interval` until `lifetime` is cancelled.
    pub async fn run(&self, lifetime: CancellationToken, poll_interval: Duration) {
        if self.producers.is_empty() {
            lifetime.cancelled().await;
            return;
        }

        let config = LoopConfig::new(METRICS_LOOP_NAME, poll_interval);
        run_loop(lifetime, self.sink.clone(), config, || self.tick()).await;
    }

    /// Poll all producers once and emit their gauges.
    pub async fn tick(&self) -> TaskResult {
        let mut failed = Vec::new();

        for producer in &self.producers {
            let producer_name = producer.metric_name();
            match poll(producer.as_ref()).await {
                Ok((gauges, tags)) => self.emit(producer_name, &gauges, &tags),
                Err(e) => {
                    tracing::warn!(producer = %producer_name, error = %e, "Metric producer failed");
                    failed.push(producer_name.to_string());
                }
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(TaskError::msg(format!(
                "metric producer(s) failed: {}",
                failed.join(", ")
            )))
        }
    }

    fn emit(&self, producer_name: &str, gauges: &Gauges, tags: &GaugeTags) {
        for (key, value) in gauges {
            let name = format!("gauge.{producer_name}.{key}");
            let key_tags = tags.get(key).map(Vec::as_slice).unwrap_or_default();
            self.sink.gauge(&name, *value, key_tags, 1.0);
        }
    }
}

async fn poll(producer: &dyn MetricProducer) -> Result<(Gauges, GaugeTags), TaskError> {
    let collect = async {
        let gauges = producer.gauges().await?;
        let tags = producer.tags().await?;
        Ok::<_, TaskError>((gauges, tags))
    };

    AssertUnwindSafe(collect)
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(TaskError::from_panic(panic)))
}
