//! Capability contracts registered on the supervisor.
//!
//! Each registration site only needs the small trait it stores. Closures are
//! adapted with [`ServiceFn`] and [`CleanupFn`]; health probes are plain
//! [`HealthCheck`] records.

use std::collections::BTreeMap;
use std::future::Future;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{TaskError, TaskResult};
use crate::health::HealthCheck;

/// Gauge values keyed by metric key. Ordered so emission order is stable.
pub type Gauges = BTreeMap<String, f64>;

/// Tags keyed by metric key.
pub type GaugeTags = BTreeMap<String, Vec<String>>;

/// A long-running unit of work.
///
/// `run` should return once `lifetime` is cancelled. Returning on its own,
/// successfully or not, stops every other service.
#[async_trait]
pub trait ServiceTask: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, lifetime: CancellationToken) -> TaskResult;
}

/// A source of gauges polled once per metrics tick.
#[async_trait]
pub trait MetricProducer: Send + Sync {
    /// Middle segment of emitted gauge names. May be empty.
    fn metric_name(&self) -> &str;

    async fn gauges(&self) -> Result<Gauges, TaskError>;

    async fn tags(&self) -> Result<GaugeTags, TaskError>;
}

/// Something that exposes readiness and liveness checks.
pub trait HealthProbe: Send + Sync {
    fn health_checks(&self) -> HealthCheck;
}

impl HealthProbe for HealthCheck {
    fn health_checks(&self) -> HealthCheck {
        self.clone()
    }
}

/// A run-once teardown action.
#[async_trait]
pub trait CleanupTask: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, ctx: CancellationToken) -> TaskResult;
}

/// Named closure service.
pub struct ServiceFn<F> {
    name: String,
    f: F,
}

impl<F, Fut> ServiceFn<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync,
    Fut: Future<Output = TaskResult> + Send,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self { name: name.into(), f }
    }
}

#[async_trait]
impl<F, Fut> ServiceTask for ServiceFn<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync,
    Fut: Future<Output = TaskResult> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, lifetime: CancellationToken) -> TaskResult {
        (self.f)(lifetime).await
    }
}

/// Named closure cleanup task.
pub struct CleanupFn<F> {
    name: String,
    f: F,
}

impl<F, Fut> CleanupFn<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync,
    Fut: Future<Output = TaskResult> + Send,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self { name: name.into(), f }
    }
}

#[async_trait]
impl<F, Fut> CleanupTask for CleanupFn<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync,
    Fut: Future<Output = TaskResult> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: CancellationToken) -> TaskResult {
        (self.f)(ctx).await
    }
}
