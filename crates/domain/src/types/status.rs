//! Presentation-facing agent status

use serde::{Deserialize, Serialize};

use super::monitoring::MonitoringState;
use super::session::SessionSnapshot;

/// Typed payload pushed to status observers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStatus {
    pub is_target_running: bool,
    pub has_permission: bool,
    pub is_monitoring: bool,
    pub current_session: Option<SessionSnapshot>,
}

impl AgentStatus {
    #[must_use]
    pub const fn from_parts(
        monitoring: MonitoringState,
        current_session: Option<SessionSnapshot>,
    ) -> Self {
        Self {
            is_target_running: monitoring.is_target_running,
            has_permission: monitoring.has_permission,
            is_monitoring: monitoring.is_monitoring,
            current_session,
        }
    }

    #[must_use]
    pub const fn monitoring_state(&self) -> MonitoringState {
        MonitoringState::new(self.is_target_running, self.has_permission, self.is_monitoring)
    }
}
