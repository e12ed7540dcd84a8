//! Readiness and liveness check records.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::error::TaskResult;

/// A single readiness or liveness check.
pub type Check = Arc<dyn Fn(CancellationToken) -> BoxFuture<'static, TaskResult> + Send + Sync>;

/// Wrap an async closure as a [`Check`].
pub fn check_fn<F, Fut>(f: F) -> Check
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = TaskResult> + Send + 'static,
{
    Arc::new(move |ctx| f(ctx).boxed())
}

/// Named pair of optional probes, as exposed to an external health server.
#[derive(Clone)]
pub struct HealthCheck {
    pub name: String,
    pub ready: Option<Check>,
    pub live: Option<Check>,
}

impl HealthCheck {
    /// Create a record with no checks.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ready: None,
            live: None,
        }
    }

    /// Set the readiness check.
    pub fn with_ready<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        self.ready = Some(check_fn(f));
        self
    }

    /// Set the liveness check.
    pub fn with_live<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        self.live = Some(check_fn(f));
        self
    }

    /// Run the readiness check, if any.
    pub async fn check_ready(&self, ctx: CancellationToken) -> TaskResult {
        match &self.ready {
            Some(check) => check(ctx).await,
            None => Ok(()),
        }
    }

    /// Run the liveness check, if any.
    pub async fn check_live(&self, ctx: CancellationToken) -> TaskResult {
        match &self.live {
            Some(check) => check(ctx).await,
            None => Ok(()),
        }
    }
}

impl fmt::Debug for HealthCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthCheck")
            .field("name", &self.name)
            .field("ready", &self.ready.is_some())
            .field("live", &self.live.is_some())
            .finish()
    }
}
