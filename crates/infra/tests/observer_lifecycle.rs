//! Integration tests for the accessibility observer lifecycle
//!
//! **Coverage:**
//! - Start with no target running reports `TargetNotRunning`
//! - Permission denied, requested, then granted
//! - Starting twice is a no-op
//! - Snapshots flow to the subscriber
//! - Target exit and permission revocation stop monitoring by themselves
//! - Stop is idempotent

#[path = "support.rs"]
mod support;

use std::sync::Arc;
use std::time::Duration;

use jiffy_core::PermissionGate;
use jiffy_domain::MonitoringState;
use jiffy_infra::{AccessibilityObserver, ObserverConfig, ObserverError};
use support::{conversation, eventually, FakePermissionGate, FakeSnapshotSource};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().with_env_filter("debug").try_init();
}

fn fast_config() -> ObserverConfig {
    ObserverConfig {
        poll_interval: Duration::from_millis(20),
        snapshot_capacity: 8,
        join_timeout: Duration::from_secs(1),
    }
}

fn observer(
    source: &Arc<FakeSnapshotSource>,
    gate: &Arc<FakePermissionGate>,
) -> AccessibilityObserver {
    AccessibilityObserver::new(source.clone(), gate.clone(), fast_config())
}

#[tokio::test]
async fn start_without_target_reports_not_running() {
    init_tracing();
    let source = Arc::new(FakeSnapshotSource::not_running());
    let gate = Arc::new(FakePermissionGate::granted());
    let observer = observer(&source, &gate);
    let state = observer.monitoring_state();

    let err = observer.start_monitoring().await.unwrap_err();

    assert_eq!(err, ObserverError::TargetNotRunning);
    assert!(!observer.is_monitoring());
    assert_eq!(*state.borrow(), MonitoringState::new(false, true, false));
    assert_eq!(source.captures(), 0);
}

#[tokio::test]
async fn permission_flow_denied_then_granted() {
    init_tracing();
    let source = Arc::new(FakeSnapshotSource::running());
    let gate = Arc::new(FakePermissionGate::granting_on_request());
    let observer = observer(&source, &gate);

    let err = observer.start_monitoring().await.unwrap_err();
    assert_eq!(err, ObserverError::PermissionDenied);
    assert!(!observer.is_monitoring());
    assert!(!observer.monitoring_state().borrow().has_permission);

    gate.request_permission();
    assert_eq!(gate.requests(), 1);
    let probed = observer.probe().await;
    assert!(probed.can_monitor());
    assert!(!probed.is_monitoring);

    observer.start_monitoring().await.unwrap();
    assert!(observer.is_monitoring());
    assert_eq!(*observer.monitoring_state().borrow(), MonitoringState::new(true, true, true));

    observer.stop_monitoring().await.unwrap();
}

#[tokio::test]
async fn starting_twice_is_a_no_op() {
    init_tracing();
    let source = Arc::new(FakeSnapshotSource::running());
    let gate = Arc::new(FakePermissionGate::granted());
    let observer = observer(&source, &gate);

    observer.start_monitoring().await.unwrap();
    observer.start_monitoring().await.unwrap();
    assert!(observer.is_monitoring());

    observer.stop_monitoring().await.unwrap();
    assert!(!observer.is_monitoring());
}

#[tokio::test]
async fn snapshots_reach_the_subscriber() {
    init_tracing();
    let source = Arc::new(FakeSnapshotSource::running().with_script(vec![conversation()]));
    let gate = Arc::new(FakePermissionGate::granted());
    let observer = observer(&source, &gate);
    let mut snapshots = observer.subscribe_snapshots().expect("first subscriber");
    assert!(observer.subscribe_snapshots().is_none());

    observer.start_monitoring().await.unwrap();
    let snapshot = tokio::time::timeout(Duration::from_secs(1), snapshots.recv())
        .await
        .expect("snapshot within a second")
        .expect("channel open");

    assert!(snapshot.is_well_formed());
    assert_eq!(snapshot.title(), Some("Claude"));
    assert_eq!(snapshot.turns.len(), 2);

    observer.stop_monitoring().await.unwrap();
}

#[tokio::test]
async fn target_exit_stops_monitoring() {
    init_tracing();
    let source = Arc::new(FakeSnapshotSource::running());
    let gate = Arc::new(FakePermissionGate::granted());
    let observer = observer(&source, &gate);
    let state = observer.monitoring_state();

    observer.start_monitoring().await.unwrap();
    source.set_running(false);

    assert!(eventually(|| !observer.is_monitoring()).await);
    assert_eq!(*state.borrow(), MonitoringState::new(false, true, false));

    // The loop already exited; stopping is still fine.
    observer.stop_monitoring().await.unwrap();
}

#[tokio::test]
async fn revoked_permission_stops_monitoring() {
    init_tracing();
    let source = Arc::new(FakeSnapshotSource::running());
    let gate = Arc::new(FakePermissionGate::granted());
    let observer = observer(&source, &gate);

    observer.start_monitoring().await.unwrap();
    gate.set_granted(false);

    assert!(eventually(|| !observer.is_monitoring()).await);
    let state = *observer.monitoring_state().borrow();
    assert!(!state.has_permission);
    assert!(!state.is_monitoring);
}

#[tokio::test]
async fn restart_after_target_returns() {
    init_tracing();
    let source = Arc::new(FakeSnapshotSource::running());
    let gate = Arc::new(FakePermissionGate::granted());
    let observer = observer(&source, &gate);

    observer.start_monitoring().await.unwrap();
    source.set_running(false);
    assert!(eventually(|| !observer.is_monitoring()).await);

    source.set_running(true);
    observer.start_monitoring().await.unwrap();
    assert!(observer.is_monitoring());
    observer.stop_monitoring().await.unwrap();
}

#[tokio::test]
async fn stop_without_start_is_ok() {
    let source = Arc::new(FakeSnapshotSource::running());
    let gate = Arc::new(FakePermissionGate::granted());
    let observer = observer(&source, &gate);

    observer.stop_monitoring().await.unwrap();
    observer.stop_monitoring().await.unwrap();
    assert!(!observer.is_monitoring());
}

#[tokio::test]
async fn zero_poll_interval_still_samples() {
    init_tracing();
    let source = Arc::new(FakeSnapshotSource::running().with_script(vec![conversation()]));
    let gate = Arc::new(FakePermissionGate::granted());
    let config = ObserverConfig { poll_interval: Duration::ZERO, ..fast_config() };
    let observer = AccessibilityObserver::new(source.clone(), gate.clone(), config);
    let mut snapshots = observer.subscribe_snapshots().expect("first subscriber");

    observer.start_monitoring().await.unwrap();
    let snapshot = tokio::time::timeout(Duration::from_secs(1), snapshots.recv())
        .await
        .expect("snapshot within a second")
        .expect("channel open");
    assert_eq!(snapshot.turns.len(), 2);

    observer.stop_monitoring().await.unwrap();
    assert!(!observer.is_monitoring());
}
