//! Platform-specific implementations
//!
//! This module provides platform adapters for the observation ports.
//!
//! # Platform Support
//!
//! - **macOS**: Full support via Accessibility APIs and NSWorkspace
//! - **Other platforms**: Fallback stubs (no permission, target never found)

use std::sync::Arc;

use jiffy_core::{PermissionGate, SnapshotSource};
use jiffy_domain::constants::{MAX_AX_TREE_DEPTH, MAX_AX_TREE_NODES};
use jiffy_domain::MonitoringConfig;

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(target_os = "macos")]
pub use macos::{AxPermissionGate, MacSnapshotSource};

#[cfg(not(target_os = "macos"))]
pub mod fallback {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use jiffy_core::{PermissionGate, SnapshotSource, TargetProcess};
    use jiffy_domain::{AgentError, Result as DomainResult, Snapshot};

    const UNSUPPORTED: &str = "Accessibility observation is only supported on macOS";

    /// Permission gate for unsupported platforms: never granted.
    #[derive(Default)]
    pub struct FallbackPermissionGate {
        warned: AtomicBool,
    }

    impl FallbackPermissionGate {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl PermissionGate for FallbackPermissionGate {
        fn has_permission(&self) -> bool {
            if !self.warned.swap(true, Ordering::Relaxed) {
                tracing::warn!("{UNSUPPORTED}");
            }
            false
        }

        fn request_permission(&self) {
            tracing::debug!("Permission request ignored on unsupported platform");
        }
    }

    /// Snapshot source for unsupported platforms: the target is never found.
    pub struct FallbackSnapshotSource;

    #[async_trait]
    impl SnapshotSource for FallbackSnapshotSource {
        async fn locate_target(&self) -> DomainResult<Option<TargetProcess>> {
            Ok(None)
        }

        async fn capture(&self, _target: &TargetProcess) -> DomainResult<Snapshot> {
            Err(AgentError::Platform(UNSUPPORTED.to_string()))
        }
    }

}

#[cfg(not(target_os = "macos"))]
pub use fallback::{FallbackPermissionGate, FallbackSnapshotSource};

/// The permission gate for the current platform.
pub fn default_permission_gate(config: &MonitoringConfig) -> Arc<dyn PermissionGate> {
    #[cfg(target_os = "macos")]
    {
        Arc::new(AxPermissionGate::new(config.permission_cache_ttl()))
    }
    #[cfg(not(target_os = "macos"))]
    {
        let _ = config;
        Arc::new(FallbackPermissionGate::new())
    }
}

/// The snapshot source for the current platform.
pub fn default_snapshot_source(config: &MonitoringConfig) -> Arc<dyn SnapshotSource> {
    #[cfg(target_os = "macos")]
    {
        let limits =
            macos::ScanLimits { max_depth: MAX_AX_TREE_DEPTH, max_nodes: MAX_AX_TREE_NODES };
        Arc::new(MacSnapshotSource::new(config.target_bundle_id.clone(), limits))
    }
    #[cfg(not(target_os = "macos"))]
    {
        let _ = (config, MAX_AX_TREE_DEPTH, MAX_AX_TREE_NODES);
        Arc::new(FallbackSnapshotSource)
    }
}
