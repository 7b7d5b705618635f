//! Event dispatcher: in-memory outbound queue plus a single delivery worker.
//!
//! `enqueue` never blocks the caller: it takes a short lock on the bounded
//! [`EventQueue`], pushes, and wakes the worker. The worker drains batches,
//! attaches the current identity and forwards them with bounded exponential
//! backoff. Auth failures pause delivery, request a credential refresh and
//! leave the batch queued without spending its attempt budget.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use jiffy_core::EventSink;
//! use jiffy_infra::sync::{DispatcherConfig, EventDispatcher, TelemetryClient};
//! # async fn example(auth: Arc<dyn jiffy_core::AuthContext>) -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(TelemetryClient::new(Default::default())?);
//! let dispatcher = Arc::new(EventDispatcher::new(client, auth, DispatcherConfig::default()));
//!
//! dispatcher.start().await?;
//! // ... sessions enqueue events through `dyn EventSink` ...
//! dispatcher.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jiffy_core::{AuthContext, EventQueue, EventSink, PushOutcome, QueuedEvent};
use jiffy_domain::constants::WORKER_JOIN_TIMEOUT_SECS;
use jiffy_domain::{ActivityEvent, DispatchConfig, Identity};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{Mutex as TokioMutex, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::errors::DeliveryError;
use super::retry::BackoffPolicy;
use super::telemetry_client::TelemetryClient;

/// Configuration for the dispatcher.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Pending events held before the overflow policy applies
    pub queue_capacity: usize,
    /// Maximum number of events per request
    pub batch_size: usize,
    /// Retry schedule for a single batch
    pub backoff: BackoffPolicy,
    /// How long delivery pauses after an auth failure
    pub auth_pause: Duration,
    /// Join timeout when stopping
    pub join_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self::from(&DispatchConfig::default())
    }
}

impl From<&DispatchConfig> for DispatcherConfig {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            queue_capacity: config.queue_capacity,
            batch_size: config.batch_size.max(1),
            backoff: BackoffPolicy::from(config),
            auth_pause: Duration::from_secs(config.auth_pause_secs),
            join_timeout: Duration::from_secs(WORKER_JOIN_TIMEOUT_SECS),
        }
    }
}

/// Point-in-time delivery counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatcherStats {
    pub enqueued: u64,
    pub delivered: u64,
    pub failed: u64,
    pub dropped_overflow: u64,
    pub attempts: u64,
    pub pending: usize,
}

impl DispatcherStats {
    /// Every enqueued event was delivered, failed or dropped; nothing is
    /// queued or in flight.
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        self.delivered + self.failed + self.dropped_overflow >= self.enqueued
    }
}

/// Interface for submitting a batch to a remote destination.
#[async_trait]
pub trait EventForwarder: Send + Sync {
    async fn forward(&self, identity: &Identity, batch: &[QueuedEvent])
        -> Result<(), DeliveryError>;
}

#[async_trait]
impl EventForwarder for TelemetryClient {
    async fn forward(
        &self,
        identity: &Identity,
        batch: &[QueuedEvent],
    ) -> Result<(), DeliveryError> {
        self.post_events(identity, batch).await
    }
}

#[derive(Default)]
struct Counters {
    enqueued: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
    attempts: AtomicU64,
}

/// State shared between producers and the worker
struct Shared {
    queue: Mutex<EventQueue>,
    notify: Notify,
    counters: Counters,
}

impl Shared {
    fn requeue(&self, batch: Vec<QueuedEvent>) {
        let evicted = self.queue.lock().requeue_front(batch);
        if evicted > 0 {
            debug!(evicted, "Queue over capacity after requeue");
        }
    }
}

/// How a batch left the worker's hands
enum BatchOutcome {
    Delivered,
    Failed,
    Paused,
    Cancelled,
}

struct Worker {
    cancellation: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

/// Outbound event queue with explicit worker lifecycle management.
pub struct EventDispatcher {
    shared: Arc<Shared>,
    forwarder: Arc<dyn EventForwarder>,
    auth: Arc<dyn AuthContext>,
    config: DispatcherConfig,
    worker: TokioMutex<Worker>,
}

impl EventDispatcher {
    pub fn new(
        forwarder: Arc<dyn EventForwarder>,
        auth: Arc<dyn AuthContext>,
        config: DispatcherConfig,
    ) -> Self {
        let shared = Arc::new(Shared {
            queue: Mutex::new(EventQueue::new(config.queue_capacity)),
            notify: Notify::new(),
            counters: Counters::default(),
        });
        Self {
            shared,
            forwarder,
            auth,
            config,
            worker: TokioMutex::new(Worker {
                cancellation: CancellationToken::new(),
                task_handle: None,
            }),
        }
    }

    /// Start the worker, spawning the background delivery task.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<(), String> {
        let mut worker = self.worker.lock().await;
        if worker.task_handle.is_some() {
            return Err("Dispatcher already running".to_string());
        }

        info!("Starting event dispatcher");

        // Create fresh cancellation token
        worker.cancellation = CancellationToken::new();

        let shared = Arc::clone(&self.shared);
        let forwarder = Arc::clone(&self.forwarder);
        let auth = Arc::clone(&self.auth);
        let config = self.config.clone();
        let cancel = worker.cancellation.clone();

        worker.task_handle = Some(tokio::spawn(async move {
            Self::deliver_loop(shared, forwarder, auth, config, cancel).await;
        }));

        info!("Event dispatcher started");
        Ok(())
    }

    /// Stop the worker and wait for the delivery task to finish.
    ///
    /// Undelivered events stay in memory.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> Result<(), String> {
        let mut worker = self.worker.lock().await;
        let Some(handle) = worker.task_handle.take() else {
            return Err("Dispatcher not running".to_string());
        };

        info!("Stopping event dispatcher");
        worker.cancellation.cancel();

        match tokio::time::timeout(self.config.join_timeout, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!("Dispatcher task panicked: {}", e);
                return Err("Dispatcher task panicked".to_string());
            }
            Err(_) => {
                warn!("Dispatcher task did not complete within timeout");
                return Err("Dispatcher task timeout".to_string());
            }
        }

        worker.cancellation = CancellationToken::new();
        info!(pending = self.shared.queue.lock().len(), "Event dispatcher stopped");
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.worker.lock().await.task_handle.is_some()
    }

    pub fn stats(&self) -> DispatcherStats {
        let (pending, dropped_overflow) = {
            let queue = self.shared.queue.lock();
            (queue.len(), queue.dropped())
        };
        let counters = &self.shared.counters;
        DispatcherStats {
            enqueued: counters.enqueued.load(Ordering::Relaxed),
            delivered: counters.delivered.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
            dropped_overflow,
            attempts: counters.attempts.load(Ordering::Relaxed),
            pending,
        }
    }

    /// Background delivery loop.
    async fn deliver_loop(
        shared: Arc<Shared>,
        forwarder: Arc<dyn EventForwarder>,
        auth: Arc<dyn AuthContext>,
        config: DispatcherConfig,
        cancel: CancellationToken,
    ) {
        loop {
            let batch = shared.queue.lock().take_batch(config.batch_size);
            if batch.is_empty() {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = shared.notify.notified() => continue,
                }
            }

            let count = batch.len() as u64;
            let outcome =
                Self::deliver_batch(&shared, &*forwarder, &*auth, &config, &cancel, batch).await;
            let counters = &shared.counters;
            match outcome {
                BatchOutcome::Delivered => {
                    counters.delivered.fetch_add(count, Ordering::Relaxed);
                }
                BatchOutcome::Failed => {
                    counters.failed.fetch_add(count, Ordering::Relaxed);
                }
                BatchOutcome::Paused => {
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(config.auth_pause) => {
                            debug!("Resuming delivery after auth pause");
                        }
                    }
                }
                BatchOutcome::Cancelled => break,
            }
        }
        debug!("Dispatcher deliver loop cancelled");
    }

    /// Deliver one batch, retrying transient failures.
    async fn deliver_batch(
        shared: &Shared,
        forwarder: &dyn EventForwarder,
        auth: &dyn AuthContext,
        config: &DispatcherConfig,
        cancel: &CancellationToken,
        batch: Vec<QueuedEvent>,
    ) -> BatchOutcome {
        let first_seq = batch.first().map_or(0, |e| e.sequence_id);
        let mut attempts = 0_u32;

        loop {
            let Some(identity) = auth.current_identity().await else {
                warn!(first_seq, "No identity available; pausing delivery");
                auth.on_auth_failure().await;
                shared.requeue(batch);
                return BatchOutcome::Paused;
            };

            shared.counters.attempts.fetch_add(1, Ordering::Relaxed);
            let result = tokio::select! {
                () = cancel.cancelled() => {
                    shared.requeue(batch);
                    return BatchOutcome::Cancelled;
                }
                result = forwarder.forward(&identity, &batch) => result,
            };

            let err = match result {
                Ok(()) => {
                    info!(count = batch.len(), first_seq, "Delivered event batch");
                    return BatchOutcome::Delivered;
                }
                Err(err) => err,
            };

            if err.is_auth() {
                warn!(error = %err, first_seq, "Delivery rejected credentials; pausing");
                auth.on_auth_failure().await;
                shared.requeue(batch);
                return BatchOutcome::Paused;
            }

            attempts = attempts.saturating_add(1);
            if !err.should_retry() {
                error!(error = %err, count = batch.len(), first_seq, "Discarding undeliverable batch");
                return BatchOutcome::Failed;
            }
            if !config.backoff.allows_retry(attempts) {
                error!(
                    error = %err,
                    attempts,
                    count = batch.len(),
                    first_seq,
                    "Delivery attempts exhausted"
                );
                return BatchOutcome::Failed;
            }

            let hint = Duration::from_secs(err.retry_delay_secs());
            let delay = config.backoff.delay_with_hint(attempts - 1, hint);
            warn!(
                error = %err,
                attempt = attempts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Delivery failed; retrying"
            );
            tokio::select! {
                () = cancel.cancelled() => {
                    shared.requeue(batch);
                    return BatchOutcome::Cancelled;
                }
                () = tokio::time::sleep(delay) => {}
            }
        }
    }
}

impl EventSink for EventDispatcher {
    fn enqueue(&self, event: ActivityEvent) {
        let event_type = event.event_type;
        let outcome = self.shared.queue.lock().push(event);
        self.shared.counters.enqueued.fetch_add(1, Ordering::Relaxed);

        match outcome {
            PushOutcome::Accepted { sequence_id } => {
                debug!(sequence_id, %event_type, "Event queued");
            }
            PushOutcome::Evicted { sequence_id, evicted } => {
                debug!(sequence_id, %event_type, %evicted, "Queue full; evicted oldest event");
            }
            PushOutcome::DroppedIncoming { sequence_id } => {
                debug!(sequence_id, %event_type, "Queue full of session boundaries; event dropped");
            }
        }
        self.shared.notify.notify_one();
    }
}

impl Drop for EventDispatcher {
    fn drop(&mut self) {
        let worker = self.worker.get_mut();
        if worker.task_handle.is_some() {
            warn!("EventDispatcher dropped while running; cancelling tasks");
            worker.cancellation.cancel();
        }
    }
}
