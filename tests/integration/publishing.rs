//! Integration tests for snapshot publication
//!
//! - Rate limiting of publish requests
//! - Staleness escalation as seen by a consumer
//! - Delivery to the monitoring bus over HTTP

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use node_monitor::actors::publisher::MIN_PUBLISH_INTERVAL;
use node_monitor::actors::{Publisher, PublisherHandle, Scheduler};
use node_monitor::clock::{Clock, ManualClock};
use node_monitor::monitor::Monitor;
use node_monitor::monitors::{CheckGroup, UsageChecks};
use node_monitor::sink::{ChannelSink, HttpSink, PublishSink, SinkError};
use node_monitor::tools::HostTools;
use node_monitor::{
    GroupKind, GroupUpdate, Severity, Snapshot, TIME_SINCE_UPDATE_KEY, UPDATE_STATUS_KEY,
};
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

#[tokio::test]
async fn test_publish_requests_within_interval_yield_one_snapshot() {
    let config = resolved_config(false);
    let clock = ManualClock::default();
    let (sink, mut receiver) = ChannelSink::new(16);
    let cancel = CancellationToken::new();

    let (publisher, task) = PublisherHandle::spawn(
        Publisher::new(monitor(&config, clock.clone()), Arc::new(sink)),
        Duration::from_secs(3600),
        cancel.clone(),
    );

    // the first tick of the loop publishes right away
    receiver.recv().await.unwrap();

    clock.advance(Duration::from_millis(200));
    assert!(!publisher.publish_now().await.unwrap());
    clock.advance(Duration::from_millis(200));
    assert!(!publisher.publish_now().await.unwrap());
    assert!(receiver.try_recv().is_err());

    clock.advance(MIN_PUBLISH_INTERVAL);
    assert!(publisher.publish_now().await.unwrap());
    assert_eq!(receiver.recv().await.unwrap().stamp, clock.now());

    publisher.shutdown();
    task.await.unwrap();
    assert!(cancel.is_cancelled());
}

#[tokio::test]
async fn test_snapshot_escalates_with_staleness() {
    let config = resolved_config(false);
    let clock = ManualClock::default();
    let monitor = monitor(&config, clock.clone());
    let scheduler = Scheduler::with_groups(
        vec![Box::new(UsageChecks::new())],
        monitor.clone(),
        Arc::new(healthy_tools()),
        Duration::from_secs(3600),
    );
    let (sink, mut receiver) = ChannelSink::new(16);
    let mut publisher = Publisher::new(monitor, Arc::new(sink));

    let usage = scheduler.handle(GroupKind::Usage).unwrap();
    assert_eq!(usage.run_now().await.unwrap(), Severity::Ok);

    let name = "c1 CPU Usage";
    let level_and_status = |snapshot: &Snapshot| {
        let record = snapshot.record(name).unwrap();
        (record.level, record.value(UPDATE_STATUS_KEY).unwrap().to_string())
    };

    assert!(publisher.publish().await.unwrap());
    let snapshot = receiver.recv().await.unwrap();
    assert_eq!(level_and_status(&snapshot), (Severity::Ok, String::from("OK")));

    clock.advance(Duration::from_secs(21));
    assert!(publisher.publish().await.unwrap());
    let snapshot = receiver.recv().await.unwrap();
    assert_eq!(level_and_status(&snapshot), (Severity::Warn, String::from("Lagging")));
    assert_eq!(
        snapshot.record(name).unwrap().value(TIME_SINCE_UPDATE_KEY),
        Some("21.000")
    );

    clock.advance(Duration::from_secs(15));
    assert!(publisher.publish().await.unwrap());
    let snapshot = receiver.recv().await.unwrap();
    assert_eq!(level_and_status(&snapshot), (Severity::Error, String::from("Stale")));

    // a fresh pass brings the record back
    usage.run_now().await.unwrap();
    clock.advance(Duration::from_secs(1));
    assert!(publisher.publish().await.unwrap());
    let snapshot = receiver.recv().await.unwrap();
    assert_eq!(level_and_status(&snapshot), (Severity::Ok, String::from("OK")));

    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_snapshot_records_in_order_with_nfs() {
    let config = resolved_config(true);
    let clock = ManualClock::default();
    let monitor = monitor(&config, clock.clone());
    let scheduler = Scheduler::start(&config, monitor.clone(), Arc::new(healthy_tools())).await;
    for kind in [GroupKind::Temperature, GroupKind::Usage, GroupKind::Nfs] {
        scheduler.handle(kind).unwrap().run_now().await.unwrap();
    }

    let snapshot = monitor.snapshot().await;

    let names: Vec<_> = snapshot.records.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["c1 CPU Temperature", "c1 CPU Usage", "c1 NFS IO"]);
    assert!(snapshot.records.iter().all(|r| r.hardware_id == "c1.cluster"));
    assert_eq!(snapshot.level(), Severity::Ok);

    let nfs = snapshot.record("c1 NFS IO").unwrap();
    assert_eq!(nfs.value("fs1:/home Read Blks/s"), Some("12.00"));
    assert_eq!(nfs.message, "OK");

    scheduler.shutdown().await;
}

/// Merges into the monitor while publishing, which only works if the lock is released.
struct ReentrantSink {
    monitor: Monitor,
}

#[async_trait]
impl PublishSink for ReentrantSink {
    async fn publish(&self, _snapshot: &Snapshot) -> Result<(), SinkError> {
        self.monitor
            .merge(GroupKind::Usage, GroupUpdate::default())
            .await;
        Ok(())
    }
}

#[tokio::test]
async fn test_sink_runs_outside_the_lock() {
    let config = resolved_config(false);
    let monitor = monitor(&config, ManualClock::default());
    let mut publisher = Publisher::new(
        monitor.clone(),
        Arc::new(ReentrantSink {
            monitor: monitor.clone(),
        }),
    );

    let published = tokio::time::timeout(Duration::from_secs(1), publisher.publish())
        .await
        .expect("publish deadlocked");

    assert!(published.unwrap());
}

#[tokio::test]
async fn test_snapshots_are_posted_to_the_bus() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/diagnostics"))
        .and(header("X-MONITORING-SECRET", "test-token"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let config = resolved_config(false);
    let clock = ManualClock::default();
    let sink = HttpSink::new(
        format!("{}/diagnostics", server.uri()),
        Some(String::from("test-token")),
    )
    .unwrap();
    sink.attach().await.unwrap();

    let mut publisher = Publisher::new(monitor(&config, clock.clone()), Arc::new(sink));
    assert!(publisher.publish().await.unwrap());
    clock.advance(Duration::from_secs(1));
    assert!(publisher.publish().await.unwrap());

    let requests = server.received_requests().await.unwrap();
    let posted: Vec<_> = requests
        .iter()
        .filter(|request| request.method.as_str() == "POST")
        .collect();
    assert_eq!(posted.len(), 2);

    let snapshot: Snapshot = serde_json::from_slice(&posted[1].body).unwrap();
    assert_eq!(snapshot.records.len(), 2);
    assert_eq!(snapshot.records[0].name, "c1 CPU Temperature");
    assert_eq!(snapshot.records[0].message, "No Data");
}

#[tokio::test]
async fn test_bus_rejection_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let config = resolved_config(false);
    let sink = HttpSink::new(server.uri(), None).unwrap();
    let mut publisher = Publisher::new(monitor(&config, ManualClock::default()), Arc::new(sink));

    assert_matches!(publisher.publish().await, Err(SinkError::Rejected(_)));
}

#[tokio::test]
async fn test_custom_group_through_scheduler() {
    struct Fixed;

    #[async_trait]
    impl CheckGroup for Fixed {
        fn kind(&self) -> GroupKind {
            GroupKind::Temperature
        }

        async fn run_pass(&mut self, _tools: &dyn HostTools) -> GroupUpdate {
            GroupUpdate {
                level: Severity::Warn,
                message: String::from("CPU Warm"),
                values: vec![],
            }
        }
    }

    let config = resolved_config(false);
    let monitor = monitor(&config, ManualClock::default());
    let scheduler = Scheduler::with_groups(
        vec![Box::new(Fixed)],
        monitor.clone(),
        Arc::new(healthy_tools()),
        Duration::from_secs(3600),
    );

    scheduler
        .handle(GroupKind::Temperature)
        .unwrap()
        .run_now()
        .await
        .unwrap();

    let snapshot = monitor.snapshot().await;
    let temperature = snapshot.record("c1 CPU Temperature").unwrap();
    assert_eq!(temperature.level, Severity::Warn);
    assert_eq!(temperature.message, "CPU Warm");
    // the untouched usage record still shows its placeholder
    assert_eq!(snapshot.record("c1 CPU Usage").unwrap().message, "No Data");

    scheduler.shutdown().await;
}
