//! Presentation status hub
//!
//! Observers subscribe for typed [`AgentStatus`] updates and get an id back
//! for unsubscribing. Publishing copies the observer list before calling out,
//! so observers may subscribe or unsubscribe from inside a callback.

use std::sync::Arc;

use jiffy_domain::AgentStatus;
use parking_lot::RwLock;

/// Receives every published status
pub trait StatusObserver: Send + Sync {
    fn on_status(&self, status: &AgentStatus);
}

impl<F> StatusObserver for F
where
    F: Fn(&AgentStatus) + Send + Sync,
{
    fn on_status(&self, status: &AgentStatus) {
        self(status);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct HubInner {
    next_id: u64,
    observers: Vec<(SubscriptionId, Arc<dyn StatusObserver>)>,
    latest: AgentStatus,
}

#[derive(Default)]
pub struct StatusHub {
    inner: RwLock<HubInner>,
}

impl StatusHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer; it immediately receives the latest status.
    pub fn subscribe(&self, observer: Arc<dyn StatusObserver>) -> SubscriptionId {
        let (id, latest) = {
            let mut inner = self.inner.write();
            inner.next_id = inner.next_id.wrapping_add(1);
            let id = SubscriptionId(inner.next_id);
            inner.observers.push((id, Arc::clone(&observer)));
            (id, inner.latest.clone())
        };
        observer.on_status(&latest);
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.inner.write();
        let before = inner.observers.len();
        inner.observers.retain(|(existing, _)| *existing != id);
        inner.observers.len() != before
    }

    /// Store `status` and notify observers if it changed.
    pub fn publish(&self, status: AgentStatus) -> bool {
        let observers: Vec<Arc<dyn StatusObserver>> = {
            let mut inner = self.inner.write();
            if inner.latest == status {
                return false;
            }
            inner.latest = status.clone();
            inner.observers.iter().map(|(_, observer)| Arc::clone(observer)).collect()
        };
        for observer in observers {
            observer.on_status(&status);
        }
        true
    }

    #[must_use]
    pub fn latest(&self) -> AgentStatus {
        self.inner.read().latest.clone()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.read().observers.len()
    }
}
