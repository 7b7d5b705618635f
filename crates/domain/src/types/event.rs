//! Activity events
//!
//! Events are immutable once created. The classifier produces the four
//! interaction types, the session manager produces the two boundary types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants;
use crate::impl_wire_name_conversions;

/// Kind of activity observed in the target application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    #[serde(rename = "ai_prompt_submitted")]
    PromptSubmitted,
    #[serde(rename = "ai_response_received")]
    ResponseReceived,
    #[serde(rename = "ai_visit")]
    Visit,
    UserActivity,
    SessionStarted,
    SessionEnded,
}

impl_wire_name_conversions!(EventType {
    PromptSubmitted => constants::EVENT_AI_PROMPT_SUBMITTED,
    ResponseReceived => constants::EVENT_AI_RESPONSE_RECEIVED,
    Visit => constants::EVENT_AI_VISIT,
    UserActivity => constants::EVENT_USER_ACTIVITY,
    SessionStarted => constants::EVENT_SESSION_STARTED,
    SessionEnded => constants::EVENT_SESSION_ENDED,
});

impl EventType {
    /// Session boundary events are never evicted from the outbound queue.
    #[must_use]
    pub const fn is_boundary(&self) -> bool {
        matches!(self, Self::SessionStarted | Self::SessionEnded)
    }
}

/// Small, content-free metadata attached to an event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadHint {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus_seconds: Option<u64>,
}

/// A single typed observation headed for the telemetry endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    #[serde(default)]
    pub hint: PayloadHint,
}

impl ActivityEvent {
    /// Event sourced from the tracked desktop application.
    #[must_use]
    pub fn new(event_type: EventType, timestamp: DateTime<Utc>) -> Self {
        Self {
            event_type,
            timestamp,
            source: constants::SOURCE_CLAUDE_DESKTOP.to_string(),
            hint: PayloadHint::default(),
        }
    }

    #[must_use]
    pub fn with_hint(mut self, hint: PayloadHint) -> Self {
        self.hint = hint;
        self
    }

    #[must_use]
    pub const fn is_boundary(&self) -> bool {
        self.event_type.is_boundary()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_match_endpoint_contract() {
        assert_eq!(EventType::PromptSubmitted.as_str(), "ai_prompt_submitted");
        assert_eq!(EventType::ResponseReceived.as_str(), "ai_response_received");
        assert_eq!(EventType::Visit.as_str(), "ai_visit");
        assert_eq!(EventType::UserActivity.as_str(), "user_activity");
        assert_eq!(EventType::SessionStarted.as_str(), "session_started");
        assert_eq!(EventType::SessionEnded.as_str(), "session_ended");
    }

    #[test]
    fn serde_and_display_agree() {
        for event_type in [
            EventType::PromptSubmitted,
            EventType::ResponseReceived,
            EventType::Visit,
            EventType::UserActivity,
            EventType::SessionStarted,
            EventType::SessionEnded,
        ] {
            let json = serde_json::to_value(event_type).unwrap();
            assert_eq!(json, serde_json::Value::String(event_type.to_string()));
        }
    }

    #[test]
    fn only_session_events_are_boundaries() {
        assert!(EventType::SessionStarted.is_boundary());
        assert!(EventType::SessionEnded.is_boundary());
        assert!(!EventType::UserActivity.is_boundary());
        assert!(!EventType::PromptSubmitted.is_boundary());
    }

    #[test]
    fn empty_hint_fields_are_omitted() {
        let hint = PayloadHint { text_length: Some(12), ..PayloadHint::default() };
        let json = serde_json::to_value(&hint).unwrap();
        assert_eq!(json, serde_json::json!({ "text_length": 12 }));
    }

    #[test]
    fn new_events_carry_desktop_source_tag() {
        let event = ActivityEvent::new(EventType::Visit, Utc::now());
        assert_eq!(event.source, "claude_desktop");
    }
}
