//! Snapshot classification
//!
//! [`classify`] is a pure function from the previous snapshot, the current
//! snapshot and a small carried [`ClassifierState`] to the events of one tick.
//! [`EventClassifier`] wraps it for callers that just feed snapshots in order.
//!
//! Rules, in priority order:
//! 1. No previous snapshot: `Visit`, nothing else.
//! 2. A user turn appended or extended: `PromptSubmitted`.
//! 3. Assistant growth seen while the target is not generating:
//!    `ResponseReceived`. A reply that renders within one poll settles on the
//!    tick it appears.
//! 4. Any other user-driven change: `UserActivity`, at most once per debounce
//!    window.
//!
//! When 2 and 3 match on the same tick only `PromptSubmitted` is emitted; the
//! response stays pending and is reported on a later tick, or by
//! [`EventClassifier::flush_pending`] when the session ends first.

mod diff;

use chrono::{DateTime, Duration, Utc};
use jiffy_domain::constants::USER_ACTIVITY_DEBOUNCE_SECS;
use jiffy_domain::{ActivityEvent, EventType, PayloadHint, Snapshot, TurnRole};
use tracing::debug;

use self::diff::diff;

/// State carried between ticks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierState {
    /// Assistant content grew and has not been reported yet
    pub response_pending: bool,
    /// Capture time of the last emitted `UserActivity`
    pub last_user_activity_at: Option<DateTime<Utc>>,
    /// Timestamp of the last emitted event; later events never precede it
    pub last_emitted_at: Option<DateTime<Utc>>,
    /// Minimum spacing between two `UserActivity` events
    pub debounce_window: Duration,
}

impl Default for ClassifierState {
    fn default() -> Self {
        Self::with_debounce(Duration::seconds(USER_ACTIVITY_DEBOUNCE_SECS))
    }
}

impl ClassifierState {
    #[must_use]
    pub const fn with_debounce(debounce_window: Duration) -> Self {
        Self {
            response_pending: false,
            last_user_activity_at: None,
            last_emitted_at: None,
            debounce_window,
        }
    }

    fn user_activity_allowed(&self, at: DateTime<Utc>) -> bool {
        self.last_user_activity_at.map_or(true, |last| at - last >= self.debounce_window)
    }

    /// Timestamps never go backwards even if capture clocks do.
    fn stamp(&mut self, at: DateTime<Utc>) -> DateTime<Utc> {
        let stamped = self.last_emitted_at.map_or(at, |last| at.max(last));
        self.last_emitted_at = Some(stamped);
        stamped
    }
}

/// Events for one tick plus the state to carry into the next
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub events: Vec<ActivityEvent>,
    pub state: ClassifierState,
}

impl Classification {
    fn unchanged(state: &ClassifierState) -> Self {
        Self { events: Vec::new(), state: state.clone() }
    }
}

/// Classify one observation tick.
///
/// Never fails: malformed snapshots and unchanged snapshots classify to the
/// empty sequence with the state left as is.
#[must_use]
pub fn classify(
    state: &ClassifierState,
    previous: Option<&Snapshot>,
    current: &Snapshot,
) -> Classification {
    if !current.is_well_formed() {
        debug!(turns = current.turns.len(), "Classification anomaly: snapshot has no window");
        return Classification::unchanged(state);
    }

    let mut next = state.clone();

    let Some(previous) = previous else {
        next.response_pending = false;
        let at = next.stamp(current.captured_at);
        let visit = ActivityEvent::new(EventType::Visit, at)
            .with_hint(PayloadHint { turn_count: Some(current.turns.len()), ..Default::default() });
        return Classification { events: vec![visit], state: next };
    };

    if previous == current {
        return Classification::unchanged(state);
    }

    let delta = diff(previous, current);
    let mut events = Vec::new();

    let response_pending = state.response_pending || delta.assistant_growth.is_some();
    let response_settled = response_pending && !current.generating;

    if let Some(text_length) = delta.user_growth {
        // Prompt wins a tie with a settled response.
        let at = next.stamp(current.captured_at);
        events.push(
            ActivityEvent::new(EventType::PromptSubmitted, at)
                .with_hint(PayloadHint { text_length: Some(text_length), ..Default::default() }),
        );
        next.response_pending = response_pending;
    } else if response_settled {
        let at = next.stamp(current.captured_at);
        events.push(response_received(current, at));
        next.response_pending = false;
    } else {
        next.response_pending = response_pending;
        if delta.has_user_interaction() && next.user_activity_allowed(current.captured_at) {
            next.last_user_activity_at = Some(current.captured_at);
            let at = next.stamp(current.captured_at);
            events.push(ActivityEvent::new(EventType::UserActivity, at));
        }
    }

    Classification { events, state: next }
}

fn response_received(snapshot: &Snapshot, at: DateTime<Utc>) -> ActivityEvent {
    let text_length = snapshot.last_turn_of(TurnRole::Assistant).map(|(_, t)| t.char_len());
    ActivityEvent::new(EventType::ResponseReceived, at)
        .with_hint(PayloadHint { text_length, ..Default::default() })
}

/// Stateful wrapper that keeps exactly one prior snapshot
#[derive(Debug, Default)]
pub struct EventClassifier {
    state: ClassifierState,
    previous: Option<Snapshot>,
}

impl EventClassifier {
    #[must_use]
    pub const fn new(state: ClassifierState) -> Self {
        Self { state, previous: None }
    }

    /// Classify `snapshot` against the retained one and retain it in turn.
    pub fn observe(&mut self, snapshot: Snapshot) -> Vec<ActivityEvent> {
        let classification = classify(&self.state, self.previous.as_ref(), &snapshot);
        self.state = classification.state;
        if snapshot.is_well_formed() {
            self.previous = Some(snapshot);
        }
        classification.events
    }

    /// Report a response that grew but never settled, e.g. because the
    /// session is about to end. Uses the last retained snapshot for its size.
    pub fn flush_pending(&mut self, now: DateTime<Utc>) -> Option<ActivityEvent> {
        if !self.state.response_pending {
            return None;
        }
        self.state.response_pending = false;
        let previous = self.previous.as_ref()?;
        let at = self.state.stamp(now);
        Some(response_received(previous, at))
    }

    /// Forget the retained snapshot so the next observation is a fresh visit.
    /// A pending response is discarded; call [`Self::flush_pending`] first to
    /// keep it.
    pub fn reset(&mut self) {
        self.previous = None;
        self.state.response_pending = false;
    }

    #[must_use]
    pub const fn state(&self) -> &ClassifierState {
        &self.state
    }
}
