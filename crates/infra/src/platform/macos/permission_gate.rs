//! Accessibility permission gate backed by `AXIsProcessTrustedWithOptions`

use std::time::{Duration, Instant};

use jiffy_core::PermissionGate;
use parking_lot::RwLock;
use tracing::info;

use super::ax_helpers::check_ax_permission;

#[derive(Clone, Copy)]
struct CachedPermission {
    value: bool,
    checked_at: Instant,
}

/// Caches the trust check for `cache_ttl`; the user can flip the setting at
/// any time, so the cache is short-lived.
pub struct AxPermissionGate {
    cache_ttl: Duration,
    cache: RwLock<Option<CachedPermission>>,
}

impl AxPermissionGate {
    pub fn new(cache_ttl: Duration) -> Self {
        Self { cache_ttl, cache: RwLock::new(None) }
    }

    fn cached(&self) -> Option<bool> {
        let cached = *self.cache.read();
        cached.filter(|entry| entry.checked_at.elapsed() < self.cache_ttl).map(|entry| entry.value)
    }

    fn store(&self, value: bool) {
        let entry = CachedPermission { value, checked_at: Instant::now() };
        let previous = self.cache.write().replace(entry);
        if previous.map(|p| p.value) != Some(value) {
            info!(has_permission = value, "Accessibility permission state changed");
        }
    }
}

impl PermissionGate for AxPermissionGate {
    fn has_permission(&self) -> bool {
        if let Some(value) = self.cached() {
            return value;
        }
        let value = check_ax_permission(false);
        self.store(value);
        value
    }

    fn request_permission(&self) {
        info!("Requesting accessibility permission");
        // The returned value predates the user's answer.
        let _ = check_ax_permission(true);
        *self.cache.write() = None;
    }
}
