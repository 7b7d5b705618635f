//! Port interfaces for accessibility observation
//!
//! These traits isolate every nondeterministic OS interaction behind a small
//! boundary so observation logic can run against fakes.

use async_trait::async_trait;
use jiffy_domain::{Result, Snapshot};

/// Accessibility permission required to read another process's UI tree
pub trait PermissionGate: Send + Sync {
    /// Cheap check; implementations may cache with a short TTL.
    fn has_permission(&self) -> bool;

    /// Ask the OS to show its consent prompt.
    ///
    /// Fire-and-forget: the outcome is observed on a later
    /// [`has_permission`](Self::has_permission) call, never reported here.
    fn request_permission(&self);
}

/// A located instance of the tracked application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetProcess {
    pub pid: i32,
    pub bundle_id: String,
    pub name: Option<String>,
    pub is_frontmost: bool,
}

/// Trait for locating the target and reading its UI tree
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Find the running target. `Ok(None)` means "not running".
    async fn locate_target(&self) -> Result<Option<TargetProcess>>;

    /// Read the target's window into an immutable snapshot.
    async fn capture(&self, target: &TargetProcess) -> Result<Snapshot>;
}
