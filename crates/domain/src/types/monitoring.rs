//! Process-wide monitoring state

use serde::{Deserialize, Serialize};

/// Whether the target runs, whether we may read it, and whether we are.
///
/// `is_monitoring` is only ever true while both other flags are true; every
/// constructor and setter normalizes the value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoringState {
    pub is_target_running: bool,
    pub has_permission: bool,
    pub is_monitoring: bool,
}

impl MonitoringState {
    #[must_use]
    pub const fn new(is_target_running: bool, has_permission: bool, is_monitoring: bool) -> Self {
        Self {
            is_target_running,
            has_permission,
            is_monitoring: is_monitoring && is_target_running && has_permission,
        }
    }

    #[must_use]
    pub const fn with_target_running(self, running: bool) -> Self {
        Self::new(running, self.has_permission, self.is_monitoring)
    }

    #[must_use]
    pub const fn with_permission(self, granted: bool) -> Self {
        Self::new(self.is_target_running, granted, self.is_monitoring)
    }

    #[must_use]
    pub const fn with_monitoring(self, monitoring: bool) -> Self {
        Self::new(self.is_target_running, self.has_permission, monitoring)
    }

    /// Target running and permission granted, so monitoring may start.
    #[must_use]
    pub const fn can_monitor(&self) -> bool {
        self.is_target_running && self.has_permission
    }

    /// True when moving from `previous` to `self` must end an active session.
    #[must_use]
    pub const fn forces_session_end(&self, previous: &Self) -> bool {
        previous.is_monitoring && !self.is_monitoring
    }
}
