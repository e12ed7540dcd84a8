//! Termination watchers.
//!
//! # Responsibilities
//! - Block until an external termination condition is observed
//! - Report it as the [`SupervisorError::Terminated`] sentinel
//! - Return quietly when the run lifetime is cancelled first

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{field, Instrument};

use crate::error::SupervisorError;
use crate::lifecycle::signals::wait_for_shutdown_signal;
use crate::observability::tracing::record_outcome;

/// Polling interval floor, so a zero delay does not spin.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Strategy deciding when the supervisor should terminate.
///
/// `watch` returns `Err(SupervisorError::Terminated)` when termination is
/// requested, `Ok(())` if `lifetime` is cancelled first, and any other error if
/// the watcher could not be installed. `delay` is how often a polling watcher
/// re-checks its condition.
#[async_trait]
pub trait TerminationWatcher: Send + Sync {
    async fn watch(&self, lifetime: CancellationToken, delay: Duration) -> Result<(), SupervisorError>;
}

/// Default watcher: OS termination signals, plus an optional termination file.
#[derive(Debug, Clone, Default)]
pub struct SignalWatcher {
    termination_file: Option<PathBuf>,
}

impl SignalWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also terminate once `path` exists. The file is polled every `delay`.
    pub fn with_termination_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.termination_file = Some(path.into());
        self
    }
}

#[async_trait]
impl TerminationWatcher for SignalWatcher {
    async fn watch(&self, lifetime: CancellationToken, delay: Duration) -> Result<(), SupervisorError> {
        let span = tracing::info_span!(
            "termination.watch",
            termination_file = field::Empty,
            result = field::Empty,
            error = field::Empty,
        );
        if let Some(path) = &self.termination_file {
            span.record("termination_file", field::display(path.display()));
        }

        let file = self.termination_file.as_deref();
        let outcome: Result<(), SupervisorError> = async {
            tokio::select! {
                _ = lifetime.cancelled() => Ok(()),
                res = wait_for_shutdown_signal() => match res {
                    Ok(()) => Err(SupervisorError::Terminated),
                    Err(e) => Err(SupervisorError::Watcher(e)),
                },
                _ = wait_for_file(file, delay) => Err(SupervisorError::Terminated),
            }
        }
        .instrument(span.clone())
        .await;

        record_outcome(&span, &outcome);
        outcome
    }
}

/// Resolve once `path` exists. Never resolves without a path.
async fn wait_for_file(path: Option<&Path>, delay: Duration) {
    let Some(path) = path else {
        return std::future::pending().await;
    };

    let interval = delay.max(MIN_POLL_INTERVAL);
    loop {
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            tracing::info!(path = %path.display(), "Termination file found");
            return;
        }
        tokio::time::sleep(interval).await;
    }
}

/// Closure adapter for injecting a termination strategy.
pub struct WatchFn<F> {
    f: F,
}

impl<F, Fut> WatchFn<F>
where
    F: Fn(CancellationToken, Duration) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), SupervisorError>> + Send,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> TerminationWatcher for WatchFn<F>
where
    F: Fn(CancellationToken, Duration) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), SupervisorError>> + Send,
{
    async fn watch(&self, lifetime: CancellationToken, delay: Duration) -> Result<(), SupervisorError> {
        (self.f)(lifetime, delay).await
    }
}
