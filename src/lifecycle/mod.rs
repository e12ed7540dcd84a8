//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Termination (termination.rs):
//!     TerminationWatcher::watch(lifetime, delay)
//!     → fires SupervisorError::Terminated (planned shutdown)
//!     → or returns Ok(()) once the run lifetime is cancelled elsewhere
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT/SIGQUIT → termination
//!
//! Shutdown (shutdown.rs):
//!     Shutdown::trigger() → termination (control plane, tests)
//! ```
//!
//! # Design Decisions
//! - The watcher is injected into System at construction, never a global hook
//! - Termination is not a failure; it is the expected steady-state exit path
//! - Polling watchers re-check every `delay`

pub mod shutdown;
pub mod signals;
pub mod termination;

pub use shutdown::Shutdown;
pub use termination::{SignalWatcher, TerminationWatcher, WatchFn};
