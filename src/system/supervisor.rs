//! The supervisor: registration, the run race, and cleanup.
//!
//! # States
//! ```text
//! Idle → Running → Stopped     (a service returned cleanly, or the caller cancelled)
//!                → Terminated  (the termination watcher fired)
//!                → Failed      (a service failed, or the watcher could not start)
//! ```
//!
//! # Design Decisions
//! - One lifetime token per run, child of the caller's token
//! - The first component to finish cancels the lifetime; the others drain
//! - A service failure outranks termination when both are reported
//! - Exactly one `system.run` timer per run

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{field, Instrument};
use uuid::Uuid;

use crate::config::RuntimeConfig;
use crate::error::{CleanupError, CleanupFailure, SupervisorError, TaskError};
use crate::health::HealthCheck;
use crate::lifecycle::termination::{SignalWatcher, TerminationWatcher};
use crate::observability::metrics::MetricsSink;
use crate::observability::tracing::{add_field, record_outcome};
use crate::system::contracts::{CleanupTask, HealthProbe, MetricProducer, ServiceTask};
use crate::system::metrics_loop::MetricsLoop;
use crate::system::registry::Registry;
use crate::system::services::ServiceRunner;

/// Timer emitted once per run.
pub const SYSTEM_RUN_METRIC: &str = "system.run";

/// Lifecycle state of a [`System`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RunState {
    Idle = 0,
    Running = 1,
    Stopped = 2,
    Terminated = 3,
    Failed = 4,
}

impl RunState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => RunState::Idle,
            1 => RunState::Running,
            2 => RunState::Stopped,
            3 => RunState::Terminated,
            _ => RunState::Failed,
        }
    }
}

/// Which component of a run finished, and how.
enum Finished {
    Services(Result<(), SupervisorError>),
    Metrics,
    Watcher(Result<(), SupervisorError>),
}

impl Finished {
    fn component(&self) -> &'static str {
        match self {
            Finished::Services(_) => "services",
            Finished::Metrics => "metrics",
            Finished::Watcher(_) => "termination",
        }
    }
}

/// Process-wide service supervisor.
///
/// Register services, metric producers, health probes and cleanup tasks, then
/// call [`System::run`] once and [`System::cleanup`] after it returns.
pub struct System {
    registry: Registry,
    sink: Arc<dyn MetricsSink>,
    watcher: Arc<dyn TerminationWatcher>,
    termination_delay: Duration,
    state: AtomicU8,
}

impl System {
    /// Create a supervisor emitting to `sink` and stopping when `watcher` fires.
    pub fn new(sink: Arc<dyn MetricsSink>, watcher: Arc<dyn TerminationWatcher>) -> Self {
        Self {
            registry: Registry::new(),
            sink,
            watcher,
            termination_delay: Duration::ZERO,
            state: AtomicU8::new(RunState::Idle as u8),
        }
    }

    /// Create a supervisor watching OS signals and the configured termination file.
    pub fn from_config(config: &RuntimeConfig, sink: Arc<dyn MetricsSink>) -> Self {
        let mut watcher = SignalWatcher::new();
        if let Some(path) = &config.termination_file {
            watcher = watcher.with_termination_file(path);
        }
        Self::new(sink, Arc::new(watcher)).with_termination_delay(config.termination_delay())
    }

    /// How often polling watchers re-check their condition.
    pub fn with_termination_delay(mut self, delay: Duration) -> Self {
        self.termination_delay = delay;
        self
    }

    pub fn add_service(&mut self, task: impl ServiceTask + 'static) {
        self.registry.add_service(task);
    }

    pub fn add_health_check(&mut self, probe: impl HealthProbe + 'static) {
        self.registry.add_health_check(probe);
    }

    pub fn add_metrics(&mut self, producer: impl MetricProducer + 'static) {
        self.registry.add_metrics(producer);
    }

    pub fn add_cleanup(&mut self, task: impl CleanupTask + 'static) {
        self.registry.add_cleanup(task);
    }

    /// Registered health checks, in registration order, for an external server.
    pub fn health_checks(&self) -> Vec<HealthCheck> {
        self.registry
            .health_checks()
            .iter()
            .map(|probe| probe.health_checks())
            .collect()
    }

    pub fn state(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Run every service, the metrics loop and the termination watcher until
    /// the first of them finishes.
    ///
    /// Returns the first service failure, [`SupervisorError::Terminated`] when
    /// the watcher fired, or `Ok(())` when a service returned cleanly or `ctx`
    /// was cancelled.
    pub async fn run(&self, ctx: &CancellationToken, poll_interval: Duration) -> Result<(), SupervisorError> {
        self.state
            .compare_exchange(
                RunState::Idle as u8,
                RunState::Running as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .map_err(|_| SupervisorError::AlreadyStarted)?;

        let span = tracing::info_span!(
            "system.run",
            run_id = %Uuid::new_v4(),
            services = field::Empty,
            producers = field::Empty,
            result = field::Empty,
            error = field::Empty,
        );

        let start = Instant::now();
        let outcome = self.race(ctx, poll_interval).instrument(span.clone()).await;
        let elapsed = start.elapsed();

        let (result, state) = match &outcome {
            Ok(()) => ("success", RunState::Stopped),
            Err(e) if e.is_terminated() => ("terminated", RunState::Terminated),
            Err(_) => ("failure", RunState::Failed),
        };

        self.sink
            .timing(SYSTEM_RUN_METRIC, elapsed, &[format!("result:{result}")], 1.0);

        span.record("result", result);
        if let Err(e) = &outcome {
            if !e.is_terminated() {
                span.record("error", field::display(e));
            }
        }
        self.state.store(state as u8, Ordering::SeqCst);

        tracing::info!(parent: &span, result, elapsed_ms = elapsed.as_millis() as u64, "Supervisor run finished");
        outcome
    }

    async fn race(&self, ctx: &CancellationToken, poll_interval: Duration) -> Result<(), SupervisorError> {
        let lifetime = ctx.child_token();
        let mut set = JoinSet::new();

        add_field("services", self.registry.services().len());
        add_field("producers", self.registry.metrics().len());

        tracing::info!(
            services = self.registry.services().len(),
            metric_producers = self.registry.metrics().len(),
            cleanups = self.registry.cleanups().len(),
            ?poll_interval,
            "Supervisor starting"
        );

        let runner = ServiceRunner::new(self.registry.services().to_vec());
        let token = lifetime.clone();
        set.spawn(async move { Finished::Services(runner.run(token).await) }.in_current_span());

        let metrics = MetricsLoop::new(self.registry.metrics().to_vec(), self.sink.clone());
        let token = lifetime.clone();
        set.spawn(
            async move {
                metrics.run(token, poll_interval).await;
                Finished::Metrics
            }
            .in_current_span(),
        );

        let watcher = self.watcher.clone();
        let delay = self.termination_delay;
        let token = lifetime.clone();
        set.spawn(async move { Finished::Watcher(watcher.watch(token, delay).await) }.in_current_span());

        let mut services = None;
        let mut termination = None;
        let mut first = true;

        while let Some(joined) = set.join_next().await {
            let finished = match joined {
                Ok(finished) => finished,
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(e) => {
                    tracing::error!(error = %e, "Supervisor component aborted");
                    lifetime.cancel();
                    continue;
                }
            };

            if first {
                first = false;
                tracing::info!(component = finished.component(), "First component finished, stopping run");
                lifetime.cancel();
            }

            match finished {
                Finished::Services(res) => services = Some(res),
                Finished::Watcher(res) => termination = Some(res),
                Finished::Metrics => {}
            }
        }
        lifetime.cancel();

        if let Some(Err(e)) = services {
            return Err(e);
        }
        match termination {
            Some(Err(e)) => Err(e),
            _ => Ok(()),
        }
    }

    /// Run every cleanup task once, in registration order.
    ///
    /// All tasks run even if earlier ones fail; every failure is returned.
    pub async fn cleanup(&self, ctx: &CancellationToken) -> Result<(), CleanupError> {
        if self.state() == RunState::Running {
            return Err(CleanupError::StillRunning);
        }

        let mut failures = Vec::new();

        for task in self.registry.cleanups() {
            let name = task.name().to_string();
            let span = tracing::info_span!(
                "cleanup",
                name = %name,
                result = field::Empty,
                error = field::Empty,
            );

            let outcome = AssertUnwindSafe(task.run(ctx.clone()))
                .catch_unwind()
                .instrument(span.clone())
                .await
                .unwrap_or_else(|panic| Err(TaskError::from_panic(panic)));
            record_outcome(&span, &outcome);

            if let Err(error) = outcome {
                tracing::error!(cleanup = %name, error = %error, "Cleanup task failed");
                failures.push(CleanupFailure { name, error });
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(CleanupError::Failed { failures })
        }
    }
}
