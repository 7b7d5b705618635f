//! Usage sessions

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::impl_wire_name_conversions;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Idle,
    Active,
}

impl_wire_name_conversions!(SessionState {
    Idle => "idle",
    Active => "active",
});

/// One contiguous period of monitored engagement
///
/// Mutated only by the session manager; once `ended_at` is set the record is
/// frozen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    id: Uuid,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    total_focus_time: Duration,
    prompt_count: u32,
    response_count: u32,
}

impl Session {
    #[must_use]
    pub fn start(started_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            started_at,
            ended_at: None,
            total_focus_time: Duration::ZERO,
            prompt_count: 0,
            response_count: 0,
        }
    }

    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub const fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    #[must_use]
    pub const fn total_focus_time(&self) -> Duration {
        self.total_focus_time
    }

    #[must_use]
    pub const fn prompt_count(&self) -> u32 {
        self.prompt_count
    }

    #[must_use]
    pub const fn response_count(&self) -> u32 {
        self.response_count
    }

    #[must_use]
    pub const fn is_ended(&self) -> bool {
        self.ended_at.is_some()
    }

    /// Returns false once the session has ended.
    pub fn add_focus_time(&mut self, elapsed: Duration) -> bool {
        if self.is_ended() {
            return false;
        }
        self.total_focus_time = self.total_focus_time.saturating_add(elapsed);
        true
    }

    pub fn increment_prompts(&mut self) -> bool {
        if self.is_ended() {
            return false;
        }
        self.prompt_count = self.prompt_count.saturating_add(1);
        true
    }

    pub fn increment_responses(&mut self) -> bool {
        if self.is_ended() {
            return false;
        }
        self.response_count = self.response_count.saturating_add(1);
        true
    }

    /// Set `ended_at`. Only the first call has an effect.
    pub fn end(&mut self, ended_at: DateTime<Utc>) -> bool {
        if self.is_ended() {
            return false;
        }
        self.ended_at = Some(ended_at);
        true
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            started_at: self.started_at,
            ended_at: self.ended_at,
            total_focus_secs: self.total_focus_time.as_secs(),
            prompt_count: self.prompt_count,
            response_count: self.response_count,
        }
    }
}

/// Read-only copy of a session for presentation and diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub total_focus_secs: u64,
    pub prompt_count: u32,
    pub response_count: u32,
}
