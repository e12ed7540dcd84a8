//! Timed background loops.
//!
//! # Data Flow
//! ```text
//! run_loop(lifetime, sink, config, work)
//!     → work() once per iteration
//!     → worker_loop timer {loop_name:<name>, result:success|failure}
//!     → sleep(interval), cancellable
//! ```
//!
//! # Design Decisions
//! - The first iteration starts immediately
//! - A zero interval runs a single iteration, then idles until cancelled
//! - An iteration in flight always completes and reports its timer
//! - Iteration failures are logged and timed, never propagated

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{field, Instrument};

use crate::error::TaskResult;
use crate::observability::metrics::MetricsSink;
use crate::observability::tracing::record_outcome;

/// Timer emitted once per loop iteration.
pub const WORKER_LOOP_METRIC: &str = "worker_loop";

/// Settings for one named loop.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Value of the `loop_name` tag.
    pub name: String,
    /// Pause between iterations.
    pub interval: Duration,
}

impl LoopConfig {
    pub fn new(name: impl Into<String>, interval: Duration) -> Self {
        Self {
            name: name.into(),
            interval,
        }
    }
}

/// Run `work` repeatedly until `lifetime` is cancelled.
pub async fn run_loop<F, Fut>(
    lifetime: CancellationToken,
    sink: Arc<dyn MetricsSink>,
    config: LoopConfig,
    mut work: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = TaskResult>,
{
    tracing::debug!(loop_name = %config.name, interval = ?config.interval, "Worker loop starting");

    while !lifetime.is_cancelled() {
        let span = tracing::debug_span!(
            "worker_loop",
            loop_name = %config.name,
            result = field::Empty,
            error = field::Empty,
        );

        let start = Instant::now();
        let outcome = work().instrument(span.clone()).await;
        let elapsed = start.elapsed();

        record_outcome(&span, &outcome);
        let result = match &outcome {
            Ok(()) => "success",
            Err(e) => {
                tracing::warn!(loop_name = %config.name, error = %e, "Worker loop iteration failed");
                "failure"
            }
        };
        let tags = [format!("loop_name:{}", config.name), format!("result:{result}")];
        sink.timing(WORKER_LOOP_METRIC, elapsed, &tags, 1.0);

        if config.interval.is_zero() {
            lifetime.cancelled().await;
            break;
        }

        tokio::select! {
            _ = lifetime.cancelled() => break,
            _ = tokio::time::sleep(config.interval) => {}
        }
    }

    tracing::debug!(loop_name = %config.name, "Worker loop stopped");
}
