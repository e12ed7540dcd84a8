//! Shared fixtures for supervisor integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use service_supervisor::system::{GaugeTags, Gauges};
use service_supervisor::{CleanupFn, CleanupTask, MetricProducer, ServiceFn, ServiceTask, Shutdown, TaskError};

/// A service that blocks until its lifetime is cancelled, then flags `observed`.
pub fn blocking_service(name: &str, observed: Arc<AtomicBool>) -> impl ServiceTask {
    ServiceFn::new(name, move |lifetime: CancellationToken| {
        let observed = observed.clone();
        async move {
            lifetime.cancelled().await;
            observed.store(lifetime.is_cancelled(), Ordering::SeqCst);
            Err(TaskError::Canceled)
        }
    })
}

/// A service that blocks until cancelled, then fails while shutting down.
pub fn wind_down_failure(name: &str) -> impl ServiceTask {
    ServiceFn::new(name, |lifetime: CancellationToken| async move {
        lifetime.cancelled().await;
        Err(TaskError::msg("flush failed while winding down"))
    })
}

/// A service that fails immediately.
pub fn failing_service(name: &str, message: &'static str) -> impl ServiceTask {
    ServiceFn::new(name, move |_| async move { Err(TaskError::msg(message)) })
}

/// A cleanup task that appends its name to `log` and optionally fails.
pub fn recording_cleanup(name: &str, log: Arc<Mutex<Vec<String>>>, fail: bool) -> impl CleanupTask {
    let owned = name.to_string();
    CleanupFn::new(name, move |_| {
        let log = log.clone();
        let owned = owned.clone();
        async move {
            log.lock().unwrap().push(owned.clone());
            if fail {
                Err(TaskError::msg(format!("{owned} could not finish")))
            } else {
                Ok(())
            }
        }
    })
}

/// A producer with fixed gauges and tags that can trigger shutdown after a
/// number of polls.
pub struct StaticProducer {
    name: String,
    gauges: Gauges,
    tags: GaugeTags,
    fail: bool,
    polls: AtomicU32,
    shutdown_after: Option<(u32, Shutdown)>,
}

impl StaticProducer {
    pub fn new(name: &str, gauges: &[(&str, f64)], tags: &[(&str, &str)]) -> Self {
        Self {
            name: name.to_string(),
            gauges: gauges.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            tags: tags
                .iter()
                .map(|(k, t)| (k.to_string(), vec![t.to_string()]))
                .collect(),
            fail: false,
            polls: AtomicU32::new(0),
            shutdown_after: None,
        }
    }

    /// A producer whose gauges can never be read.
    pub fn failing(name: &str) -> Self {
        Self {
            fail: true,
            ..Self::new(name, &[], &[])
        }
    }

    /// Trigger `shutdown` once the producer has been polled `polls` times.
    pub fn shutdown_after(mut self, polls: u32, shutdown: Shutdown) -> Self {
        self.shutdown_after = Some((polls, shutdown));
        self
    }
}

#[async_trait]
impl MetricProducer for StaticProducer {
    fn metric_name(&self) -> &str {
        &self.name
    }

    async fn gauges(&self) -> Result<Gauges, TaskError> {
        if self.fail {
            return Err(TaskError::msg("gauges unavailable"));
        }
        Ok(self.gauges.clone())
    }

    async fn tags(&self) -> Result<GaugeTags, TaskError> {
        let polls = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((after, shutdown)) = &self.shutdown_after {
            if polls >= *after {
                shutdown.trigger();
            }
        }
        Ok(self.tags.clone())
    }
}
