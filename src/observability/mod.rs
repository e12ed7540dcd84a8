//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Supervisor, metrics loop, services and cleanup tasks produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (gauges and timers through a MetricsSink)
//!     → tracing.rs (spans around each concurrent unit and cleanup task)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape) or an in-memory recorder in tests
//! ```
//!
//! # Design Decisions
//! - Metric names and tags are emitted exactly as the supervisor defines them;
//!   translation to a transport happens inside the sink
//! - The sink is injected, never a process global, so concurrent tests stay isolated
//! - Spans are attached with `Instrument` so they close on every exit path

pub mod logging;
pub mod metrics;
pub mod tracing;

pub use self::metrics::{MemorySink, MetricCall, MetricKind, MetricsSink, NoopSink, PrometheusSink};
