//! Concurrent execution of registered services.
//!
//! # Responsibilities
//! - Start every service on its own task, sharing one service lifetime
//! - Cancel that lifetime as soon as any service returns
//! - Report the first real failure
//!
//! # Design Decisions
//! - Services get a child of the run lifetime; the runner only cancels its own
//!   child, the supervisor cancels the rest when the runner returns
//! - `TaskError::Canceled` is a graceful exit, never a failure
//! - If the run lifetime was cancelled before any service returned, the
//!   termination cause belongs to the supervisor and the runner reports Ok,
//!   even when services fail while shutting down

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{field, Instrument};

use crate::error::{SupervisorError, TaskError, TaskResult};
use crate::observability::tracing::record_outcome;
use crate::system::contracts::ServiceTask;

/// Runs all services under one cancellable lifetime.
pub struct ServiceRunner {
    services: Vec<Arc<dyn ServiceTask>>,
}

impl ServiceRunner {
    pub fn new(services: Vec<Arc<dyn ServiceTask>>) -> Self {
        Self { services }
    }

    /// Run until a service returns or `lifetime` is cancelled, then wait for
    /// every service to wind down.
    pub async fn run(self, lifetime: CancellationToken) -> Result<(), SupervisorError> {
        if self.services.is_empty() {
            lifetime.cancelled().await;
            return Ok(());
        }

        let services_lifetime = lifetime.child_token();
        let mut set = JoinSet::new();

        for service in self.services {
            let token = services_lifetime.clone();
            let name = service.name().to_string();
            let span = tracing::info_span!(
                "service",
                name = %name,
                result = field::Empty,
                error = field::Empty,
            );

            set.spawn(
                async move {
                    tracing::info!(service = %name, "Service starting");
                    let outcome = AssertUnwindSafe(service.run(token))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|panic| Err(TaskError::from_panic(panic)));
                    record_outcome(&tracing::Span::current(), &outcome);
                    (name, outcome)
                }
                .instrument(span),
            );
        }

        let mut failure = None;

        // A service only triggers the stop if it returned before the run
        // lifetime was cancelled; errors raised while winding down are not causes.
        let triggered_by_service = tokio::select! {
            biased;
            _ = lifetime.cancelled() => false,
            Some(joined) = set.join_next() => {
                let triggered = !lifetime.is_cancelled();
                let (name, outcome) = flatten(joined);
                if triggered {
                    tracing::info!(service = %name, "Service returned, stopping remaining services");
                }
                note(&mut failure, name, outcome);
                triggered
            }
        };

        services_lifetime.cancel();

        while let Some(joined) = set.join_next().await {
            let (name, outcome) = flatten(joined);
            note(&mut failure, name, outcome);
        }

        match failure {
            Some(err) if triggered_by_service => Err(err),
            _ => Ok(()),
        }
    }
}

fn flatten(joined: Result<(String, TaskResult), tokio::task::JoinError>) -> (String, TaskResult) {
    match joined {
        Ok(pair) => pair,
        Err(e) => (
            "unknown".to_string(),
            Err(TaskError::Panicked(e.to_string())),
        ),
    }
}

/// Log a service outcome and keep the first non-cancellation failure.
fn note(failure: &mut Option<SupervisorError>, name: String, outcome: TaskResult) {
    match outcome {
        Ok(()) => tracing::info!(service = %name, "Service stopped"),
        Err(e) if e.is_canceled() => tracing::info!(service = %name, "Service canceled"),
        Err(e) => {
            tracing::error!(service = %name, error = %e, "Service failed");
            if failure.is_none() {
                *failure = Some(SupervisorError::Service {
                    service: name,
                    source: e,
                });
            }
        }
    }
}
