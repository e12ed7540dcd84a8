//! Error types for the supervisor.
//!
//! # Design Decisions
//! - Termination is a sentinel variant, checked with [`SupervisorError::is_terminated`]
//! - Service failures carry the failing service's name
//! - Cleanup failures are aggregated, never short-circuited

use thiserror::Error;

/// Boxed error returned by user code.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Outcome of a service, cleanup task or probe.
pub type TaskResult = Result<(), TaskError>;

/// Error produced by user-supplied work (services, producers, cleanup tasks, probes).
#[derive(Debug, Error)]
pub enum TaskError {
    /// The task failed with a message.
    #[error("{0}")]
    Failed(String),

    /// The task stopped because its lifetime was cancelled.
    #[error("task canceled")]
    Canceled,

    /// The task panicked.
    #[error("task panicked: {0}")]
    Panicked(String),

    /// The task failed with an underlying error.
    #[error(transparent)]
    Source(#[from] BoxError),
}

impl TaskError {
    /// Create a failure from a message.
    pub fn msg(message: impl Into<String>) -> Self {
        TaskError::Failed(message.into())
    }

    /// Whether this error only reports cancellation.
    pub fn is_canceled(&self) -> bool {
        matches!(self, TaskError::Canceled)
    }

    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        TaskError::Panicked(message)
    }
}

/// Errors returned by [`crate::System::run`] and the termination watchers.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The process was asked to terminate. This is the planned shutdown path.
    #[error("terminated")]
    Terminated,

    /// A registered service failed, cancelling its siblings.
    #[error("service '{service}' failed: {source}")]
    Service {
        /// Name of the failing service.
        service: String,
        /// The failure the service returned.
        #[source]
        source: TaskError,
    },

    /// The termination watcher could not be installed.
    #[error("termination watcher failed: {0}")]
    Watcher(#[from] std::io::Error),

    /// `run` was called on a supervisor that has already run.
    #[error("supervisor has already been started")]
    AlreadyStarted,
}

impl SupervisorError {
    /// Whether this outcome is the planned termination sentinel.
    pub fn is_terminated(&self) -> bool {
        matches!(self, SupervisorError::Terminated)
    }

    /// Whether this outcome is a service failure.
    pub fn is_service_failure(&self) -> bool {
        matches!(self, SupervisorError::Service { .. })
    }
}

/// A single failed cleanup task.
#[derive(Debug)]
pub struct CleanupFailure {
    /// Name of the cleanup task.
    pub name: String,
    /// Error it returned.
    pub error: TaskError,
}

/// Errors returned by [`crate::System::cleanup`].
#[derive(Debug, Error)]
pub enum CleanupError {
    /// Cleanup was requested while `run` is still in flight.
    #[error("cleanup requested while the supervisor is still running")]
    StillRunning,

    /// One or more cleanup tasks failed. Every failure is listed.
    #[error("{} cleanup task(s) failed: {}", .failures.len(), summarize(.failures))]
    Failed {
        /// Failures in registration order.
        failures: Vec<CleanupFailure>,
    },
}

fn summarize(failures: &[CleanupFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.name, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}
