//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → SupervisorConfig (validated, immutable)
//!     → read once at startup by main and System::from_config
//! ```
//!
//! # Design Decisions
//! - No hot reload: the supervisor reads its timings once per run
//! - Every field has a default, so an empty file is a valid config
//! - serde rejects malformed input; validation.rs reports every semantic problem at once

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{LogFormat, ObservabilityConfig, RuntimeConfig, SupervisorConfig};
pub use validation::{validate_config, ValidationError};
