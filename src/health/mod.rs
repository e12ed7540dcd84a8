//! Health probe exposure.
//!
//! # Data Flow
//! ```text
//! HealthProbe registered on System (before run)
//!     → System::health_checks() enumerates HealthCheck records
//!     → external HTTP layer calls check_ready / check_live per request
//! ```
//!
//! # Design Decisions
//! - The supervisor stores probes and never invokes them itself
//! - A missing check counts as healthy

pub mod check;

pub use check::{Check, HealthCheck};
