//! Fakes for the agent's replaceable edges.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use jiffy_api::{Adapters, AppContext};
use jiffy_core::{AuthContext, PermissionGate, QueuedEvent, SnapshotSource, TargetProcess};
use jiffy_domain::{
    ActivityEvent, Config, EventType, Identity, Result as DomainResult, Snapshot, TurnRole,
};
use jiffy_infra::{DeliveryError, EventForwarder};
use parking_lot::Mutex;

#[derive(Default)]
pub struct FakePermissionGate {
    granted: AtomicBool,
    grant_on_request: bool,
    requests: AtomicUsize,
}

impl FakePermissionGate {
    pub fn granted() -> Self {
        Self { granted: AtomicBool::new(true), ..Self::default() }
    }

    /// Denied until the consent prompt is shown, then granted.
    pub fn granting_on_request() -> Self {
        Self { grant_on_request: true, ..Self::default() }
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl PermissionGate for FakePermissionGate {
    fn has_permission(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }

    fn request_permission(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.grant_on_request {
            self.granted.store(true, Ordering::SeqCst);
        }
    }
}

/// Replays a scripted conversation; repeats the last snapshot afterwards.
pub struct FakeSnapshotSource {
    running: AtomicBool,
    focused: AtomicBool,
    script: Mutex<Vec<Snapshot>>,
    last: Mutex<Option<Snapshot>>,
}

impl FakeSnapshotSource {
    pub fn new(running: bool) -> Self {
        Self {
            running: AtomicBool::new(running),
            focused: AtomicBool::new(true),
            script: Mutex::new(Vec::new()),
            last: Mutex::new(None),
        }
    }

    pub fn with_script(self, mut snapshots: Vec<Snapshot>) -> Self {
        snapshots.reverse();
        *self.script.lock() = snapshots;
        self
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    pub fn set_focused(&self, focused: bool) {
        self.focused.store(focused, Ordering::SeqCst);
    }
}

#[async_trait]
impl SnapshotSource for FakeSnapshotSource {
    async fn locate_target(&self) -> DomainResult<Option<TargetProcess>> {
        Ok(self.running.load(Ordering::SeqCst).then(|| TargetProcess {
            pid: 4242,
            bundle_id: "com.anthropic.claudefordesktop".to_string(),
            name: Some("Claude".to_string()),
            is_frontmost: self.focused.load(Ordering::SeqCst),
        }))
    }

    async fn capture(&self, target: &TargetProcess) -> DomainResult<Snapshot> {
        let next = self.script.lock().pop();
        let mut last = self.last.lock();
        let snapshot = next.or_else(|| last.clone()).unwrap_or_else(|| Snapshot::new(Utc::now()));
        *last = Some(snapshot.clone());

        let mut snapshot = snapshot.with_focus(target.is_frontmost);
        snapshot.captured_at = Utc::now();
        Ok(snapshot)
    }
}

#[derive(Default)]
pub struct StaticAuth {
    signed_out: AtomicBool,
    failures: AtomicUsize,
}

impl StaticAuth {
    pub fn signed_out() -> Self {
        Self { signed_out: AtomicBool::new(true), ..Self::default() }
    }

    pub fn set_signed_in(&self, signed_in: bool) {
        self.signed_out.store(!signed_in, Ordering::SeqCst);
    }

    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthContext for StaticAuth {
    async fn current_identity(&self) -> Option<Identity> {
        (!self.signed_out.load(Ordering::SeqCst)).then(|| Identity::new("test-token", "user-1"))
    }

    async fn on_auth_failure(&self) {
        self.failures.fetch_add(1, Ordering::SeqCst);
    }
}

/// Forwarder that replays scripted failures, then records delivered events.
#[derive(Default)]
pub struct ScriptedForwarder {
    failures: Mutex<Vec<DeliveryError>>,
    delivered: Mutex<Vec<QueuedEvent>>,
    calls: AtomicUsize,
}

impl ScriptedForwarder {
    pub fn failing_first(mut failures: Vec<DeliveryError>) -> Self {
        failures.reverse();
        Self { failures: Mutex::new(failures), ..Self::default() }
    }

    pub fn delivered(&self) -> Vec<ActivityEvent> {
        self.delivered.lock().iter().map(|queued| queued.event.clone()).collect()
    }

    pub fn delivered_types(&self) -> Vec<EventType> {
        self.delivered.lock().iter().map(|queued| queued.event.event_type).collect()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventForwarder for ScriptedForwarder {
    async fn forward(&self, _identity: &Identity, batch: &[QueuedEvent]) -> Result<(), DeliveryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.failures.lock().pop() {
            return Err(err);
        }
        self.delivered.lock().extend(batch.iter().cloned());
        Ok(())
    }
}

/// Fast timings so the loops turn over in milliseconds.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.monitoring.poll_interval_ms = 20;
    config.monitoring.permission_cache_ttl_ms = 0;
    config.monitoring.focus_tick_ms = 250;
    config.dispatch.base_delay_ms = 1;
    config.dispatch.max_delay_ms = 5;
    config.dispatch.jitter_factor = 0.0;
    config
}

pub struct Harness {
    pub ctx: AppContext,
    pub source: Arc<FakeSnapshotSource>,
    pub gate: Arc<FakePermissionGate>,
    pub auth: Arc<StaticAuth>,
    pub forwarder: Arc<ScriptedForwarder>,
}

impl Harness {
    pub fn new(source: FakeSnapshotSource, gate: FakePermissionGate) -> Self {
        Self::with_forwarder(source, gate, ScriptedForwarder::default())
    }

    pub fn with_forwarder(
        source: FakeSnapshotSource,
        gate: FakePermissionGate,
        forwarder: ScriptedForwarder,
    ) -> Self {
        Self::with_parts(source, gate, StaticAuth::default(), forwarder)
    }

    pub fn with_auth(source: FakeSnapshotSource, gate: FakePermissionGate, auth: StaticAuth) -> Self {
        Self::with_parts(source, gate, auth, ScriptedForwarder::default())
    }

    fn with_parts(
        source: FakeSnapshotSource,
        gate: FakePermissionGate,
        auth: StaticAuth,
        forwarder: ScriptedForwarder,
    ) -> Self {
        let source = Arc::new(source);
        let gate = Arc::new(gate);
        let auth = Arc::new(auth);
        let forwarder = Arc::new(forwarder);
        let ctx = AppContext::with_adapters(
            test_config(),
            Adapters {
                source: source.clone(),
                gate: gate.clone(),
                auth: auth.clone(),
                forwarder: forwarder.clone(),
            },
        );
        Self { ctx, source, gate, auth, forwarder }
    }
}

/// A snapshot whose only user turn reads `text`.
pub fn user_says(text: &str) -> Snapshot {
    Snapshot::new(Utc::now()).with_title("Claude").with_turn(TurnRole::User, text)
}

pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    eventually_within(Duration::from_secs(3), &mut condition).await
}

pub async fn eventually_within(timeout: Duration, condition: &mut impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
