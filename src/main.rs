//! Service supervisor daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────┐
//!   │                            System                                │
//!   │                                                                  │
//!   │   ┌──────────────┐   ┌──────────────┐   ┌────────────────────┐   │
//!   │   │ServiceRunner │   │ MetricsLoop  │   │ TerminationWatcher │   │
//!   │   │ (1 task per  │   │ gauge.*      │   │ SIGTERM / SIGINT / │   │
//!   │   │  service)    │   │ worker_loop  │   │ termination file   │   │
//!   │   └──────┬───────┘   └──────┬───────┘   └─────────┬──────────┘   │
//!   │          └──────── one lifetime token ────────────┘              │
//!   │                 first to finish cancels the rest                 │
//!   │                             │                                    │
//!   │                      system.run timer                            │
//!   └─────────────────────────────┼────────────────────────────────────┘
//!                                 ▼
//!                         cleanup tasks (in order)
//! ```
//!
//! The binary wires a heartbeat service and an uptime producer so the
//! supervisor can be exercised end to end.

use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use service_supervisor::config::{load_config, SupervisorConfig};
use service_supervisor::observability::logging::init_logging;
use service_supervisor::observability::metrics::{init_metrics, MetricsSink, NoopSink, PrometheusSink};
use service_supervisor::system::{GaugeTags, Gauges};
use service_supervisor::{
    CleanupFn, HealthCheck, MetricProducer, ServiceFn, System, TaskError, TaskResult,
};

#[derive(Parser)]
#[command(name = "service-supervisor")]
#[command(about = "Runs supervised services until terminated", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seconds between heartbeat log lines.
    #[arg(long, default_value_t = 30)]
    heartbeat_secs: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("service-supervisor: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<ExitCode, Box<dyn Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => SupervisorConfig::default(),
    };

    init_logging(&config.observability)?;
    tracing::info!("service-supervisor v{} starting", env!("CARGO_PKG_VERSION"));

    let sink: Arc<dyn MetricsSink> = if config.observability.metrics_enabled {
        init_metrics(config.observability.metrics_address.parse()?)?;
        Arc::new(PrometheusSink)
    } else {
        Arc::new(NoopSink)
    };

    let mut system = System::from_config(&config.supervisor, sink);

    let heartbeat = Duration::from_secs(cli.heartbeat_secs.max(1));
    system.add_service(ServiceFn::new("heartbeat", move |lifetime: CancellationToken| {
        heartbeat_loop(lifetime, heartbeat)
    }));
    system.add_metrics(Uptime {
        started: Instant::now(),
    });
    system.add_health_check(HealthCheck::new("supervisor").with_live(|_| async { Ok(()) }));
    system.add_cleanup(CleanupFn::new("shutdown-log", |_| async {
        tracing::info!("Supervisor cleanup complete");
        Ok(())
    }));

    for check in system.health_checks() {
        tracing::info!(probe = %check.name, "Health probe available");
    }

    let ctx = CancellationToken::new();
    let outcome = system
        .run(&ctx, config.supervisor.metrics_poll_interval())
        .await;
    let cleanup = system.cleanup(&ctx).await;

    let mut code = ExitCode::SUCCESS;
    match outcome {
        Ok(()) => tracing::info!("Supervisor stopped"),
        Err(e) if e.is_terminated() => tracing::info!("Supervisor terminated"),
        Err(e) => {
            tracing::error!(error = %e, "Supervisor failed");
            code = ExitCode::FAILURE;
        }
    }
    if let Err(e) = cleanup {
        tracing::error!(error = %e, "Cleanup failed");
        code = ExitCode::FAILURE;
    }

    Ok(code)
}

async fn heartbeat_loop(lifetime: CancellationToken, every: Duration) -> TaskResult {
    let mut ticker = tokio::time::interval(every);
    loop {
        tokio::select! {
            _ = lifetime.cancelled() => return Err(TaskError::Canceled),
            _ = ticker.tick() => tracing::debug!("heartbeat"),
        }
    }
}

/// Process uptime, reported as `gauge.process.uptime_seconds`.
struct Uptime {
    started: Instant,
}

#[async_trait]
impl MetricProducer for Uptime {
    fn metric_name(&self) -> &str {
        "process"
    }

    async fn gauges(&self) -> Result<Gauges, TaskError> {
        Ok(Gauges::from([(
            "uptime_seconds".to_string(),
            self.started.elapsed().as_secs_f64(),
        )]))
    }

    async fn tags(&self) -> Result<GaugeTags, TaskError> {
        Ok(GaugeTags::new())
    }
}
