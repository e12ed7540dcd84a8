//! End-to-end supervisor runs against an in-memory metrics sink.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use common::{blocking_service, failing_service, wind_down_failure, StaticProducer};
use service_supervisor::observability::MetricKind;
use service_supervisor::{
    CleanupFn, HealthCheck, MemorySink, RunState, ServiceFn, Shutdown, SupervisorError, System,
    TaskError, WatchFn,
};

fn tags(values: &[&str]) -> Vec<String> {
    values.iter().map(|t| t.to_string()).collect()
}

#[tokio::test]
async fn test_terminates_after_first_metrics_poll() {
    let sink = Arc::new(MemorySink::new());
    let shutdown = Shutdown::new();
    let mut system = System::new(sink.clone(), Arc::new(shutdown.clone()));

    let observed = Arc::new(AtomicBool::new(false));
    system.add_service(blocking_service("service", observed.clone()));
    system.add_metrics(
        StaticProducer::new(
            "",
            &[("key_a", 1.0), ("key_b", 2.0)],
            &[("key_a", "foo:bar"), ("key_b", "baz:qux")],
        )
        .shutdown_after(1, shutdown.clone()),
    );
    system.add_health_check(HealthCheck::new("health-check-1"));

    let cleaned = Arc::new(AtomicBool::new(false));
    let flag = cleaned.clone();
    system.add_cleanup(CleanupFn::new("cleanup", move |_| {
        let flag = flag.clone();
        async move {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        }
    }));

    let ctx = CancellationToken::new();
    let err = system.run(&ctx, Duration::ZERO).await.unwrap_err();
    assert!(err.is_terminated());
    assert_eq!(system.state(), RunState::Terminated);
    assert!(observed.load(Ordering::SeqCst));

    system.cleanup(&ctx).await.unwrap();
    assert!(cleaned.load(Ordering::SeqCst));

    let calls = sink.calls();
    assert_eq!(calls.len(), 4, "unexpected emissions: {calls:?}");

    assert_eq!(calls[0].kind, MetricKind::Gauge);
    assert_eq!(calls[0].name, "gauge..key_a");
    assert_eq!(calls[0].value, 1.0);
    assert_eq!(calls[0].tags, tags(&["foo:bar"]));
    assert_eq!(calls[0].rate, 1.0);

    assert_eq!(calls[1].kind, MetricKind::Gauge);
    assert_eq!(calls[1].name, "gauge..key_b");
    assert_eq!(calls[1].value, 2.0);
    assert_eq!(calls[1].tags, tags(&["baz:qux"]));
    assert_eq!(calls[1].rate, 1.0);

    assert_eq!(calls[2].kind, MetricKind::Timer);
    assert_eq!(calls[2].name, "worker_loop");
    assert_eq!(calls[2].tags, tags(&["loop_name:metric-loop", "result:success"]));
    assert_eq!(calls[2].rate, 1.0);

    assert_eq!(calls[3].kind, MetricKind::Timer);
    assert_eq!(calls[3].name, "system.run");
    assert_eq!(calls[3].tags, tags(&["result:terminated"]));
    assert_eq!(calls[3].rate, 1.0);
}

#[tokio::test]
async fn test_empty_system_terminates_immediately() {
    let sink = Arc::new(MemorySink::new());
    let shutdown = Shutdown::new();
    shutdown.trigger();
    let system = System::new(sink.clone(), Arc::new(shutdown));

    let ctx = CancellationToken::new();
    let err = system.run(&ctx, Duration::from_millis(10)).await.unwrap_err();
    assert!(err.is_terminated());

    assert!(sink.calls_named("worker_loop").is_empty());
    assert!(sink
        .calls()
        .iter()
        .all(|call| !call.name.starts_with("gauge.")));

    let runs = sink.calls_named("system.run");
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].tags, tags(&["result:terminated"]));

    assert!(system.cleanup(&ctx).await.is_ok());
    assert!(system.health_checks().is_empty());
}

#[tokio::test]
async fn test_service_failure_stops_run() {
    let sink = Arc::new(MemorySink::new());
    let mut system = System::new(sink.clone(), Arc::new(Shutdown::new()));

    let observed = Arc::new(AtomicBool::new(false));
    system.add_service(blocking_service("steady", observed.clone()));
    system.add_service(failing_service("broken", "listener closed"));

    let err = system
        .run(&CancellationToken::new(), Duration::from_secs(60))
        .await
        .unwrap_err();

    match &err {
        SupervisorError::Service { service, source } => {
            assert_eq!(service, "broken");
            assert_eq!(source.to_string(), "listener closed");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.is_service_failure());
    assert!(!err.is_terminated());
    assert!(observed.load(Ordering::SeqCst));
    assert_eq!(system.state(), RunState::Failed);

    let runs = sink.calls_named("system.run");
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].tags, tags(&["result:failure"]));
}

async fn terminate_with_wind_down_failure() {
    let sink = Arc::new(MemorySink::new());
    let shutdown = Shutdown::new();
    let mut system = System::new(sink.clone(), Arc::new(shutdown.clone()));
    system.add_service(wind_down_failure("flusher"));

    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        trigger.trigger();
    });

    let err = system
        .run(&CancellationToken::new(), Duration::from_secs(60))
        .await
        .unwrap_err();
    assert!(err.is_terminated(), "expected termination, got {err}");
    assert_eq!(system.state(), RunState::Terminated);

    let runs = sink.calls_named("system.run");
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].tags, tags(&["result:terminated"]));
}

#[tokio::test]
async fn test_wind_down_failure_after_termination_is_terminated() {
    terminate_with_wind_down_failure().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_wind_down_failure_after_termination_multi_thread() {
    for _ in 0..50 {
        terminate_with_wind_down_failure().await;
    }
}

#[tokio::test]
async fn test_clean_service_return_is_success() {
    let sink = Arc::new(MemorySink::new());
    let mut system = System::new(sink.clone(), Arc::new(Shutdown::new()));

    let observed = Arc::new(AtomicBool::new(false));
    system.add_service(blocking_service("steady", observed.clone()));
    system.add_service(ServiceFn::new("batch", |_| async { Ok(()) }));

    system
        .run(&CancellationToken::new(), Duration::from_secs(60))
        .await
        .unwrap();
    assert!(observed.load(Ordering::SeqCst));
    assert_eq!(system.state(), RunState::Stopped);

    let runs = sink.calls_named("system.run");
    assert_eq!(runs[0].tags, tags(&["result:success"]));
}

#[tokio::test]
async fn test_metrics_polled_every_interval() {
    let sink = Arc::new(MemorySink::new());
    let shutdown = Shutdown::new();
    let mut system = System::new(sink.clone(), Arc::new(shutdown.clone()));
    system.add_metrics(
        StaticProducer::new("queue", &[("depth", 3.0), ("lag", 0.25)], &[])
            .shutdown_after(3, shutdown.clone()),
    );

    let err = system
        .run(&CancellationToken::new(), Duration::from_millis(5))
        .await
        .unwrap_err();
    assert!(err.is_terminated());

    let ticks = sink.calls_named("worker_loop");
    assert_eq!(ticks.len(), 3);
    assert!(ticks
        .iter()
        .all(|t| t.tags == tags(&["loop_name:metric-loop", "result:success"])));
    assert_eq!(sink.calls_named("gauge.queue.depth").len(), 3);
    assert_eq!(sink.calls_named("gauge.queue.lag").len(), 3);
}

#[tokio::test]
async fn test_failing_producer_does_not_fail_run() {
    let sink = Arc::new(MemorySink::new());
    let shutdown = Shutdown::new();
    let mut system = System::new(sink.clone(), Arc::new(shutdown.clone()));
    system.add_metrics(StaticProducer::failing("broken"));
    system.add_metrics(
        StaticProducer::new("queue", &[("depth", 1.0)], &[]).shutdown_after(1, shutdown.clone()),
    );

    let err = system
        .run(&CancellationToken::new(), Duration::ZERO)
        .await
        .unwrap_err();
    assert!(err.is_terminated());

    let ticks = sink.calls_named("worker_loop");
    assert_eq!(ticks.len(), 1);
    assert_eq!(ticks[0].tags, tags(&["loop_name:metric-loop", "result:failure"]));
    assert_eq!(sink.calls_named("gauge.queue.depth").len(), 1);
}

#[tokio::test]
async fn test_watcher_receives_termination_delay() {
    let sink = Arc::new(MemorySink::new());
    let watcher = WatchFn::new(|_lifetime, delay| async move {
        if delay == Duration::from_millis(75) {
            Err(SupervisorError::Terminated)
        } else {
            Ok(())
        }
    });
    let system = System::new(sink, Arc::new(watcher)).with_termination_delay(Duration::from_millis(75));

    let err = system
        .run(&CancellationToken::new(), Duration::ZERO)
        .await
        .unwrap_err();
    assert!(err.is_terminated());
}

#[tokio::test]
async fn test_watcher_install_failure_fails_run() {
    let sink = Arc::new(MemorySink::new());
    let watcher = WatchFn::new(|_lifetime, _delay| async {
        Err(SupervisorError::Watcher(std::io::Error::other("no signal support")))
    });
    let system = System::new(sink.clone(), Arc::new(watcher));

    let err = system
        .run(&CancellationToken::new(), Duration::ZERO)
        .await
        .unwrap_err();
    assert!(matches!(err, SupervisorError::Watcher(_)));
    assert_eq!(system.state(), RunState::Failed);
    assert_eq!(sink.calls_named("system.run")[0].tags, tags(&["result:failure"]));
}

#[tokio::test]
async fn test_health_checks_listed_in_order() {
    let mut system = System::new(Arc::new(MemorySink::new()), Arc::new(Shutdown::new()));
    system.add_health_check(HealthCheck::new("database").with_ready(|_| async { Ok(()) }));
    system.add_health_check(
        HealthCheck::new("queue").with_live(|_| async { Err(TaskError::msg("consumer stalled")) }),
    );

    let checks = system.health_checks();
    let names: Vec<_> = checks.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["database", "queue"]);

    let ctx = CancellationToken::new();
    assert!(checks[0].check_ready(ctx.clone()).await.is_ok());
    assert!(checks[0].check_live(ctx.clone()).await.is_ok());
    let err = checks[1].check_live(ctx).await.unwrap_err();
    assert_eq!(err.to_string(), "consumer stalled");
}
