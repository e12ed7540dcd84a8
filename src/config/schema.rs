//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the supervisor daemon.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Run loop settings.
    pub supervisor: RuntimeConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,
}

/// Run loop configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Interval between metrics collection ticks. Zero collects once.
    pub metrics_poll_interval_ms: u64,

    /// How often polling termination watchers re-check their condition.
    pub termination_delay_ms: u64,

    /// A file whose appearance requests termination (e.g. written by a preStop hook).
    pub termination_file: Option<PathBuf>,
}

impl RuntimeConfig {
    pub fn metrics_poll_interval(&self) -> Duration {
        Duration::from_millis(self.metrics_poll_interval_ms)
    }

    pub fn termination_delay(&self) -> Duration {
        Duration::from_millis(self.termination_delay_ms)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            metrics_poll_interval_ms: 10_000,
            termination_delay_ms: 1_000,
            termination_file: None,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log output format.
    pub log_format: LogFormat,

    /// Filter directives used when `RUST_LOG` is unset.
    pub log_filter: String,

    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Prometheus exporter bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            log_filter: "service_supervisor=info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
