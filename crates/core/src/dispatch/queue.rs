//! Bounded outbound queue with boundary-preserving eviction
//!
//! Every accepted event gets a monotonic sequence id. When the queue is at
//! capacity the oldest pending non-boundary event is evicted; session boundary
//! events are never evicted, so the queue may exceed its capacity by boundary
//! events alone.

use std::collections::VecDeque;

use jiffy_domain::{ActivityEvent, EventType};

/// An event waiting for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedEvent {
    pub sequence_id: u64,
    pub event: ActivityEvent,
}

/// Result of [`EventQueue::push`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Accepted { sequence_id: u64 },
    /// Accepted after evicting an older non-boundary event
    Evicted { sequence_id: u64, evicted: EventType },
    /// Queue full of boundary events; the incoming non-boundary event was
    /// dropped
    DroppedIncoming { sequence_id: u64 },
}

impl PushOutcome {
    #[must_use]
    pub const fn sequence_id(&self) -> u64 {
        match self {
            Self::Accepted { sequence_id }
            | Self::Evicted { sequence_id, .. }
            | Self::DroppedIncoming { sequence_id } => *sequence_id,
        }
    }

    #[must_use]
    pub const fn dropped_something(&self) -> bool {
        !matches!(self, Self::Accepted { .. })
    }
}

#[derive(Debug)]
pub struct EventQueue {
    items: VecDeque<QueuedEvent>,
    capacity: usize,
    next_sequence: u64,
    dropped: u64,
}

impl EventQueue {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { items: VecDeque::with_capacity(capacity), capacity, next_sequence: 1, dropped: 0 }
    }

    pub fn push(&mut self, event: ActivityEvent) -> PushOutcome {
        let sequence_id = self.next_sequence;
        self.next_sequence = self.next_sequence.saturating_add(1);

        if self.items.len() < self.capacity {
            self.items.push_back(QueuedEvent { sequence_id, event });
            return PushOutcome::Accepted { sequence_id };
        }

        if let Some(evicted) = self.evict_oldest_non_boundary() {
            self.items.push_back(QueuedEvent { sequence_id, event });
            return PushOutcome::Evicted { sequence_id, evicted };
        }

        if event.is_boundary() {
            self.items.push_back(QueuedEvent { sequence_id, event });
            PushOutcome::Accepted { sequence_id }
        } else {
            self.dropped = self.dropped.saturating_add(1);
            PushOutcome::DroppedIncoming { sequence_id }
        }
    }

    /// Remove up to `max` events from the front.
    pub fn take_batch(&mut self, max: usize) -> Vec<QueuedEvent> {
        let count = max.min(self.items.len());
        self.items.drain(..count).collect()
    }

    /// Return an undelivered batch to the front, preserving its order.
    ///
    /// Re-applies the capacity bound afterwards; returns how many events were
    /// evicted doing so.
    pub fn requeue_front(&mut self, batch: Vec<QueuedEvent>) -> usize {
        for queued in batch.into_iter().rev() {
            self.items.push_front(queued);
        }

        let mut evicted = 0;
        while self.items.len() > self.capacity {
            if self.evict_oldest_non_boundary().is_none() {
                break;
            }
            evicted += 1;
        }
        evicted
    }

    fn evict_oldest_non_boundary(&mut self) -> Option<EventType> {
        let index = self.items.iter().position(|queued| !queued.event.is_boundary())?;
        let removed = self.items.remove(index)?;
        self.dropped = self.dropped.saturating_add(1);
        Some(removed.event.event_type)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Events dropped by the overflow policy so far.
    #[must_use]
    pub const fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueuedEvent> {
        self.items.iter()
    }
}
