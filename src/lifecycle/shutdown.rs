//! Programmatic shutdown trigger.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::SupervisorError;
use crate::lifecycle::termination::TerminationWatcher;

/// Handle that requests termination from code rather than from the OS.
///
/// Clones share the same trigger. Used as a [`TerminationWatcher`], it fires
/// once [`Shutdown::trigger`] has been called, including before `run` started.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    /// Create a new, untriggered handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request termination.
    pub fn trigger(&self) {
        tracing::info!("Shutdown requested");
        self.token.cancel();
    }

    /// Whether termination has been requested.
    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[async_trait]
impl TerminationWatcher for Shutdown {
    async fn watch(&self, lifetime: CancellationToken, _delay: Duration) -> Result<(), SupervisorError> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(SupervisorError::Terminated),
            _ = lifetime.cancelled() => Ok(()),
        }
    }
}
