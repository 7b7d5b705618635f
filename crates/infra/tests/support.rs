//! Shared fakes for infra integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use jiffy_core::{AuthContext, PermissionGate, SnapshotSource, TargetProcess};
use jiffy_domain::{Identity, Result as DomainResult, Snapshot, TurnRole};
use parking_lot::Mutex;

pub const TARGET_BUNDLE_ID: &str = "com.anthropic.claudefordesktop";

/// Permission gate whose consent prompt grants immediately when
/// `grant_on_request` is set.
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

    pub fn denied() -> Self {
        Self::default()
    }

    pub fn granting_on_request() -> Self {
        Self { grant_on_request: true, ..Self::default() }
    }

    pub fn set_granted(&self, granted: bool) {
        self.granted.store(granted, Ordering::SeqCst);
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

/// Snapshot source backed by a toggleable "running" flag and a scripted
/// sequence of snapshots. Once the script runs out the last snapshot repeats.
pub struct FakeSnapshotSource {
    running: AtomicBool,
    focused: AtomicBool,
    script: Mutex<Vec<Snapshot>>,
    last: Mutex<Option<Snapshot>>,
    captures: AtomicUsize,
}

impl FakeSnapshotSource {
    pub fn running() -> Self {
        Self::with_state(true)
    }

    pub fn not_running() -> Self {
        Self::with_state(false)
    }

    fn with_state(running: bool) -> Self {
        Self {
            running: AtomicBool::new(running),
            focused: AtomicBool::new(true),
            script: Mutex::new(Vec::new()),
            last: Mutex::new(None),
            captures: AtomicUsize::new(0),
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

    pub fn captures(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotSource for FakeSnapshotSource {
    async fn locate_target(&self) -> DomainResult<Option<TargetProcess>> {
        if !self.running.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(Some(TargetProcess {
            pid: 4242,
            bundle_id: TARGET_BUNDLE_ID.to_string(),
            name: Some("Claude".to_string()),
            is_frontmost: self.focused.load(Ordering::SeqCst),
        }))
    }

    async fn capture(&self, target: &TargetProcess) -> DomainResult<Snapshot> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().pop();
        let mut last = self.last.lock();
        let snapshot = match next {
            Some(snapshot) => snapshot,
            None => last.clone().unwrap_or_else(|| Snapshot::new(Utc::now())),
        };
        *last = Some(snapshot.clone());

        let mut snapshot = snapshot.with_focus(target.is_frontmost);
        snapshot.captured_at = Utc::now();
        Ok(snapshot)
    }
}

/// Auth collaborator with a fixed identity that counts refresh requests.
#[derive(Default)]
pub struct StaticAuth {
    signed_out: AtomicBool,
    failures: AtomicUsize,
}

impl StaticAuth {
    pub fn signed_out() -> Self {
        Self { signed_out: AtomicBool::new(true), ..Self::default() }
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

/// A conversation with one exchange.
pub fn conversation() -> Snapshot {
    Snapshot::new(Utc::now())
        .with_title("Claude")
        .with_turn(TurnRole::User, "Hello")
        .with_turn(TurnRole::Assistant, "Hi! How can I help?")
}

/// Poll `condition` every 10ms for up to two seconds.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
