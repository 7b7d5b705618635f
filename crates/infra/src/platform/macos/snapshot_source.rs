//! Snapshot source reading the target through NSWorkspace and AX

use async_trait::async_trait;
use chrono::Utc;
use jiffy_core::{SnapshotSource, TargetProcess};
use jiffy_domain::{Result as DomainResult, Snapshot, WindowMeta};
use objc2_app_kit::NSWorkspace;
use tracing::{debug, instrument};

use super::ax_helpers::{scan_window, ScanLimits};
use super::error_helpers::map_join_error;

pub struct MacSnapshotSource {
    bundle_id: String,
    limits: ScanLimits,
}

impl MacSnapshotSource {
    pub fn new(bundle_id: impl Into<String>, limits: ScanLimits) -> Self {
        Self { bundle_id: bundle_id.into(), limits }
    }
}

/// Find a running instance of `bundle_id` and whether it is frontmost.
fn find_running_target(bundle_id: &str) -> Option<TargetProcess> {
    let workspace = NSWorkspace::sharedWorkspace();
    let frontmost_pid = workspace.frontmostApplication().map(|app| app.processIdentifier());

    workspace.runningApplications().iter().find_map(|app| {
        let id = app.bundleIdentifier()?.to_string();
        if id != bundle_id {
            return None;
        }
        let pid = app.processIdentifier();
        Some(TargetProcess {
            pid,
            bundle_id: id,
            name: app.localizedName().map(|name| name.to_string()),
            is_frontmost: frontmost_pid == Some(pid),
        })
    })
}

#[async_trait]
impl SnapshotSource for MacSnapshotSource {
    async fn locate_target(&self) -> DomainResult<Option<TargetProcess>> {
        let bundle_id = self.bundle_id.clone();
        let target = tokio::task::spawn_blocking(move || find_running_target(&bundle_id))
            .await
            .map_err(map_join_error)?;
        if target.is_none() {
            debug!(bundle_id = %self.bundle_id, "Target application not running");
        }
        Ok(target)
    }

    #[instrument(skip(self, target), fields(pid = target.pid))]
    async fn capture(&self, target: &TargetProcess) -> DomainResult<Snapshot> {
        let pid = target.pid;
        let limits = self.limits;
        let scan = tokio::task::spawn_blocking(move || scan_window(pid, limits))
            .await
            .map_err(map_join_error)??;

        let captured_at = Utc::now();
        let Some(scan) = scan else {
            return Ok(Snapshot::unreadable(captured_at));
        };

        Ok(Snapshot {
            captured_at,
            window: Some(WindowMeta { title: scan.title, focused: target.is_frontmost }),
            turns: scan.turns,
            composer_length: scan.composer_length,
            generating: scan.generating,
        })
    }
}
