//! Port interface for handing events to delivery

use jiffy_domain::ActivityEvent;

/// Non-blocking event sink
///
/// `enqueue` must return immediately; delivery happens elsewhere.
pub trait EventSink: Send + Sync {
    fn enqueue(&self, event: ActivityEvent);
}
