//! Service supervisor library.
//!
//! Runs long-lived services, a periodic metrics loop and a termination watcher
//! under one cancellation lifetime, then tears down with ordered cleanup tasks.

pub mod config;
pub mod error;
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod system;
pub mod worker;

pub use config::SupervisorConfig;
pub use error::{CleanupError, SupervisorError, TaskError, TaskResult};
pub use health::HealthCheck;
pub use lifecycle::{Shutdown, SignalWatcher, TerminationWatcher, WatchFn};
pub use observability::{MemorySink, MetricsSink, PrometheusSink};
pub use system::{CleanupFn, CleanupTask, MetricProducer, RunState, ServiceFn, ServiceTask, System};
