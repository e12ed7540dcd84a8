//! Service supervisor.
//!
//! # Data Flow
//! ```text
//! Startup (single-threaded):
//!     add_service / add_metrics / add_health_check / add_cleanup
//!     → registry.rs (ordered, read-only once run starts)
//!
//! System::run(ctx, poll_interval):
//!     lifetime = ctx.child_token()
//!     ├─► services.rs      ServiceRunner  (one task per service)
//!     ├─► metrics_loop.rs  MetricsLoop    (gauges + worker_loop timer per tick)
//!     └─► TerminationWatcher              (signals, files, triggers)
//!     first to finish → lifetime.cancel() → drain → system.run timer → outcome
//!
//! System::cleanup(ctx):
//!     every CleanupTask once, in order, each in its own span → aggregated failures
//! ```
//!
//! # Design Decisions
//! - Fail fast: the first service to return cancels its siblings, no retries
//! - Termination is a sentinel outcome, not a failure
//! - Metric producer failures stay inside the tick that saw them
//! - Single use: a System runs at most once

pub mod contracts;
pub mod metrics_loop;
pub mod registry;
pub mod services;
pub mod supervisor;

pub use contracts::{
    CleanupFn, CleanupTask, GaugeTags, Gauges, HealthProbe, MetricProducer, ServiceFn, ServiceTask,
};
pub use metrics_loop::MetricsLoop;
pub use registry::Registry;
pub use services::ServiceRunner;
pub use supervisor::{RunState, System};
