//! Session lifecycle
//!
//! `SessionManager` is the only owner of the current [`Session`]. It moves
//! between `Idle` and `Active`, counts prompts and responses while active, and
//! accrues focus time from a periodic tick rather than from events.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jiffy_domain::{
    ActivityEvent, EventType, MonitoringState, PayloadHint, Session, SessionSnapshot,
    SessionState,
};
use tracing::{debug, info};

use crate::dispatch::ports::EventSink;

/// Conditions evaluated on every focus tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FocusGate {
    /// The target process is running
    pub target_running: bool,
    /// Accessibility access is granted
    pub has_permission: bool,
    /// The observer is sampling
    pub monitoring: bool,
    /// The target's window is frontmost; only checked when focus gating is on
    pub window_focused: bool,
    /// A signed-in identity is available
    pub authenticated: bool,
}

impl FocusGate {
    #[must_use]
    pub const fn from_state(
        state: MonitoringState,
        window_focused: bool,
        authenticated: bool,
    ) -> Self {
        Self {
            target_running: state.is_target_running,
            has_permission: state.has_permission,
            monitoring: state.is_monitoring,
            window_focused,
            authenticated,
        }
    }

    const fn holds(&self, require_window_focus: bool) -> bool {
        self.target_running
            && self.has_permission
            && self.monitoring
            && self.authenticated
            && (self.window_focused || !require_window_focus)
    }
}

pub struct SessionManager {
    sink: Arc<dyn EventSink>,
    session: Option<Session>,
    require_window_focus: bool,
}

impl SessionManager {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink, session: None, require_window_focus: true }
    }

    /// Accrue focus time regardless of which window is frontmost.
    #[must_use]
    pub const fn with_focus_gating(mut self, require_window_focus: bool) -> Self {
        self.require_window_focus = require_window_focus;
        self
    }

    #[must_use]
    pub const fn state(&self) -> SessionState {
        if self.session.is_some() {
            SessionState::Active
        } else {
            SessionState::Idle
        }
    }

    #[must_use]
    pub fn current(&self) -> Option<SessionSnapshot> {
        self.session.as_ref().map(Session::snapshot)
    }

    /// Idle → Active. Returns false (and emits nothing) if already active.
    pub fn start_session(&mut self, now: DateTime<Utc>) -> bool {
        if self.session.is_some() {
            debug!("start_session ignored: session already active");
            return false;
        }

        let session = Session::start(now);
        info!(session_id = %session.id(), "Session started");
        self.sink.enqueue(ActivityEvent::new(EventType::SessionStarted, now).with_hint(
            PayloadHint { session_id: Some(session.id()), ..PayloadHint::default() },
        ));
        self.session = Some(session);
        true
    }

    /// Active → Idle. Returns the finished, immutable session.
    pub fn end_session(&mut self, now: DateTime<Utc>) -> Option<Session> {
        let Some(mut session) = self.session.take() else {
            debug!("end_session ignored: no active session");
            return None;
        };

        let ended_at = now.max(session.started_at());
        session.end(ended_at);
        let focus_seconds = session.total_focus_time().as_secs();
        info!(
            session_id = %session.id(),
            prompt_count = session.prompt_count(),
            response_count = session.response_count(),
            focus_seconds,
            "Session ended"
        );
        self.sink.enqueue(ActivityEvent::new(EventType::SessionEnded, ended_at).with_hint(
            PayloadHint {
                session_id: Some(session.id()),
                prompt_count: Some(session.prompt_count()),
                response_count: Some(session.response_count()),
                focus_seconds: Some(focus_seconds),
                ..PayloadHint::default()
            },
        ));
        Some(session)
    }

    /// Count a classified event against the active session.
    pub fn record(&mut self, event: &ActivityEvent) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match event.event_type {
            EventType::PromptSubmitted => {
                session.increment_prompts();
            }
            EventType::ResponseReceived => {
                session.increment_responses();
            }
            _ => {}
        }
    }

    /// Accrue `elapsed` if a session is active and the gate holds.
    pub fn tick(&mut self, elapsed: Duration, gate: &FocusGate) -> bool {
        let require_window_focus = self.require_window_focus;
        match self.session.as_mut() {
            Some(session) if gate.holds(require_window_focus) => session.add_focus_time(elapsed),
            _ => false,
        }
    }

    /// End the active session when a monitoring transition demands it.
    pub fn on_monitoring_state(
        &mut self,
        previous: MonitoringState,
        next: MonitoringState,
        now: DateTime<Utc>,
    ) -> Option<Session> {
        if next.is_monitoring || self.session.is_none() {
            return None;
        }
        if next.forces_session_end(&previous) {
            debug!(
                target_running = next.is_target_running,
                has_permission = next.has_permission,
                "Monitoring stopped, ending session"
            );
        }
        self.end_session(now)
    }
}
