//! Ordered storage for registered capabilities.

use std::sync::Arc;

use crate::system::contracts::{CleanupTask, HealthProbe, MetricProducer, ServiceTask};

/// Capabilities registered before `run`, kept in registration order.
///
/// Mutation needs `&mut`, so nothing can register while a run borrows the
/// supervisor.
#[derive(Default)]
pub struct Registry {
    services: Vec<Arc<dyn ServiceTask>>,
    health_checks: Vec<Arc<dyn HealthProbe>>,
    metrics: Vec<Arc<dyn MetricProducer>>,
    cleanups: Vec<Arc<dyn CleanupTask>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_service(&mut self, task: impl ServiceTask + 'static) {
        tracing::debug!(service = task.name(), "Service registered");
        self.services.push(Arc::new(task));
    }

    pub fn add_health_check(&mut self, probe: impl HealthProbe + 'static) {
        self.health_checks.push(Arc::new(probe));
    }

    pub fn add_metrics(&mut self, producer: impl MetricProducer + 'static) {
        tracing::debug!(producer = producer.metric_name(), "Metric producer registered");
        self.metrics.push(Arc::new(producer));
    }

    pub fn add_cleanup(&mut self, task: impl CleanupTask + 'static) {
        tracing::debug!(cleanup = task.name(), "Cleanup task registered");
        self.cleanups.push(Arc::new(task));
    }

    pub fn services(&self) -> &[Arc<dyn ServiceTask>] {
        &self.services
    }

    pub fn health_checks(&self) -> &[Arc<dyn HealthProbe>] {
        &self.health_checks
    }

    pub fn metrics(&self) -> &[Arc<dyn MetricProducer>] {
        &self.metrics
    }

    pub fn cleanups(&self) -> &[Arc<dyn CleanupTask>] {
        &self.cleanups
    }
}
