//! Integration tests for the check scheduler
//!
//! Time is paused in these tests, so periods elapse as soon as every task is idle.

use std::sync::Arc;
use std::time::Duration;

use node_monitor::actors::Scheduler;
use node_monitor::clock::SystemClock;
use node_monitor::probes::{ipmi, load, mpstat, nfs};
use node_monitor::{GroupKind, Severity};
use pretty_assertions::assert_eq;
use tokio::time::sleep;

use crate::helpers::*;

#[tokio::test(start_paused = true)]
async fn test_passes_rearm_every_five_seconds() {
    let config = resolved_config(false);
    let tools = Arc::new(healthy_tools());
    let scheduler = Scheduler::start(&config, monitor(&config, SystemClock), tools.clone()).await;

    sleep(Duration::from_millis(100)).await;
    assert_eq!(tools.calls(&command(load::COMMAND)), 1, "first pass runs right away");

    sleep(Duration::from_secs(5)).await;
    assert_eq!(tools.calls(&command(load::COMMAND)), 2);

    sleep(Duration::from_secs(5)).await;
    assert_eq!(tools.calls(&command(load::COMMAND)), 3);
    assert_eq!(tools.calls(&command(ipmi::COMMAND)), 3);

    scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_rearming() {
    let config = resolved_config(false);
    let tools = Arc::new(healthy_tools());
    let scheduler = Scheduler::start(&config, monitor(&config, SystemClock), tools.clone()).await;

    sleep(Duration::from_millis(100)).await;
    scheduler.shutdown().await;
    let calls = tools.calls(&command(load::COMMAND));

    sleep(Duration::from_secs(30)).await;
    assert_eq!(tools.calls(&command(load::COMMAND)), calls);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_token_stops_every_group() {
    let config = resolved_config(true);
    let tools = Arc::new(healthy_tools());
    let scheduler = Scheduler::start(&config, monitor(&config, SystemClock), tools.clone()).await;

    sleep(Duration::from_millis(100)).await;
    scheduler.cancellation_token().cancel();
    sleep(Duration::from_millis(100)).await;

    let before = (
        tools.calls(&command(ipmi::COMMAND)),
        tools.calls(&command(mpstat::COMMAND)),
        tools.calls(&command(nfs::COMMAND)),
    );
    sleep(Duration::from_secs(20)).await;
    let after = (
        tools.calls(&command(ipmi::COMMAND)),
        tools.calls(&command(mpstat::COMMAND)),
        tools.calls(&command(nfs::COMMAND)),
    );

    assert_eq!(before, (1, 1, 1));
    assert_eq!(before, after);
    scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_broken_tool_only_affects_its_group() {
    let config = resolved_config(false);
    let tools = healthy_tools().with_failure(ipmi::COMMAND, 1, "Could not open device");
    let monitor = monitor(&config, SystemClock);
    let scheduler = Scheduler::start(&config, monitor.clone(), Arc::new(tools)).await;

    sleep(Duration::from_millis(100)).await;

    let temperature = monitor.record(GroupKind::Temperature).await.unwrap();
    assert_eq!(temperature.level, Severity::Error);
    assert_eq!(temperature.message, "ipmitool Error");
    assert_eq!(temperature.value("IPMI Error"), Some("Could not open device"));
    // core temperature and clock probes still ran
    assert_eq!(temperature.value("Core 0 Temp"), Some("45.0"));
    assert!(temperature.value("Core 1 Speed").is_some());

    let usage = monitor.record(GroupKind::Usage).await.unwrap();
    assert_eq!(usage.level, Severity::Ok);
    assert_eq!(usage.message, "OK");

    scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_hung_tool_only_stalls_its_group() {
    let config = resolved_config(true);
    let tools = Arc::new(SlowTools::new(
        healthy_tools(),
        nfs::COMMAND,
        Duration::from_secs(60),
    ));
    let monitor = monitor(&config, SystemClock);
    let scheduler = Scheduler::start(&config, monitor.clone(), tools.clone()).await;

    sleep(Duration::from_secs(21)).await;

    // passes at 0, 5, 10, 15 and 20 seconds while iostat has not answered yet
    assert_eq!(tools.inner.calls(&command(load::COMMAND)), 5);
    assert_eq!(tools.inner.calls(&command(nfs::COMMAND)), 0);
    let nfs = monitor.record(GroupKind::Nfs).await.unwrap();
    assert_eq!(nfs.message, "No Data");

    scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_run_now_rearms_timer() {
    let config = resolved_config(false);
    let tools = Arc::new(healthy_tools());
    let scheduler = Scheduler::start(&config, monitor(&config, SystemClock), tools.clone()).await;
    let usage = scheduler.handle(GroupKind::Usage).unwrap().clone();

    // t = 3s: extra pass, next regular pass moves from 5s to 8s
    sleep(Duration::from_secs(3)).await;
    assert_eq!(usage.run_now().await.unwrap(), Severity::Ok);
    assert_eq!(tools.calls(&command(load::COMMAND)), 2);

    sleep(Duration::from_secs(4)).await;
    assert_eq!(tools.calls(&command(load::COMMAND)), 2);

    sleep(Duration::from_secs(2)).await;
    assert_eq!(tools.calls(&command(load::COMMAND)), 3);

    scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_usage_history_survives_between_passes() {
    let config = resolved_config(false);
    let tools = Arc::new(healthy_tools());
    let monitor = monitor(&config, SystemClock);
    let scheduler = Scheduler::start(&config, monitor.clone(), tools.clone()).await;

    sleep(Duration::from_millis(100)).await;

    // an implausible reading on core 0 falls back to the previous accepted value
    tools.set_output(
        mpstat::COMMAND,
        MPSTAT.replace(
            "   0    2.00    0.00    1.00",
            "   0 2000.00    0.00    1.00",
        ),
    );
    let level = scheduler
        .handle(GroupKind::Usage)
        .unwrap()
        .run_now()
        .await
        .unwrap();

    let usage = monitor.record(GroupKind::Usage).await.unwrap();
    assert_eq!(level, Severity::Ok);
    assert_eq!(usage.value("CPU 0 User"), Some("2000.00"));
    assert_eq!(usage.value("CPU 0 Status"), Some("OK"));

    scheduler.shutdown().await;
}
