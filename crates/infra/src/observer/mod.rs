//! Accessibility observer
//!
//! Samples the target application on a fixed interval and pushes each
//! [`Snapshot`] onto a bounded channel. Monitoring state (target running,
//! permission, monitoring) is published on a watch channel so consumers never
//! call back into the observer to read it.
//!
//! The sampling task follows the usual worker lifecycle: a fresh
//! cancellation token per start, a tracked join handle, a join timeout on
//! stop, and cancellation on drop. When the target exits or permission is
//! revoked mid-run, the loop publishes the new state and exits by itself.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use jiffy_core::{PermissionGate, SnapshotSource, TargetProcess};
use jiffy_domain::constants::{MIN_TICK_MS, SNAPSHOT_CHANNEL_CAPACITY, WORKER_JOIN_TIMEOUT_SECS};
use jiffy_domain::{AgentError, MonitoringConfig, MonitoringState, Snapshot};
use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex as TokioMutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

const MIN_TICK: Duration = Duration::from_millis(MIN_TICK_MS);

/// Why monitoring could not be started or stopped cleanly
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ObserverError {
    #[error("Accessibility permission not granted")]
    PermissionDenied,

    #[error("Target application is not running")]
    TargetNotRunning,

    #[error("Observer is still stopping")]
    AlreadyStopping,

    #[error("Platform error: {0}")]
    Platform(String),
}

impl From<ObserverError> for AgentError {
    fn from(err: ObserverError) -> Self {
        match err {
            ObserverError::PermissionDenied => Self::PermissionDenied(err.to_string()),
            ObserverError::TargetNotRunning => Self::TargetNotRunning(err.to_string()),
            ObserverError::AlreadyStopping => Self::Internal(err.to_string()),
            ObserverError::Platform(message) => Self::Platform(message),
        }
    }
}

/// Configuration for the observer.
#[derive(Debug, Clone)]
pub struct ObserverConfig {
    /// Interval between samples
    pub poll_interval: Duration,
    /// Snapshots buffered before new samples are dropped
    pub snapshot_capacity: usize,
    /// Join timeout when stopping
    pub join_timeout: Duration,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self::from(&MonitoringConfig::default())
    }
}

impl From<&MonitoringConfig> for ObserverConfig {
    fn from(config: &MonitoringConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            snapshot_capacity: SNAPSHOT_CHANNEL_CAPACITY,
            join_timeout: Duration::from_secs(WORKER_JOIN_TIMEOUT_SECS),
        }
    }
}

struct Worker {
    cancellation: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

/// What one sample decided about the loop
enum Sample {
    Continue,
    Exit(MonitoringState),
}

pub struct AccessibilityObserver {
    source: Arc<dyn SnapshotSource>,
    gate: Arc<dyn PermissionGate>,
    config: ObserverConfig,
    snapshots_tx: mpsc::Sender<Snapshot>,
    snapshots_rx: parking_lot::Mutex<Option<mpsc::Receiver<Snapshot>>>,
    state_tx: watch::Sender<MonitoringState>,
    monitoring: Arc<AtomicBool>,
    stopping: AtomicBool,
    worker: TokioMutex<Worker>,
}

impl AccessibilityObserver {
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        gate: Arc<dyn PermissionGate>,
        config: ObserverConfig,
    ) -> Self {
        let (snapshots_tx, snapshots_rx) = mpsc::channel(config.snapshot_capacity.max(1));
        let (state_tx, _) = watch::channel(MonitoringState::default());
        Self {
            source,
            gate,
            config,
            snapshots_tx,
            snapshots_rx: parking_lot::Mutex::new(Some(snapshots_rx)),
            state_tx,
            monitoring: Arc::new(AtomicBool::new(false)),
            stopping: AtomicBool::new(false),
            worker: TokioMutex::new(Worker {
                cancellation: CancellationToken::new(),
                task_handle: None,
            }),
        }
    }

    /// Take the snapshot receiver. Only the first caller gets it.
    pub fn subscribe_snapshots(&self) -> Option<mpsc::Receiver<Snapshot>> {
        self.snapshots_rx.lock().take()
    }

    pub fn monitoring_state(&self) -> watch::Receiver<MonitoringState> {
        self.state_tx.subscribe()
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitoring.load(Ordering::Acquire)
    }

    /// Recompute target presence and permission without starting anything.
    #[instrument(skip(self))]
    pub async fn probe(&self) -> MonitoringState {
        // Serialized with start/stop so a probe never publishes a stale flag.
        let _worker = self.worker.lock().await;
        let has_permission = self.gate.has_permission();
        let is_target_running = match self.source.locate_target().await {
            Ok(target) => target.is_some(),
            Err(err) => {
                warn!(error = %err, "Target lookup failed during probe");
                false
            }
        };
        let state = MonitoringState::new(is_target_running, has_permission, self.is_monitoring());
        self.publish(state);
        state
    }

    /// Start sampling the target. A no-op if already monitoring.
    ///
    /// # Errors
    /// - [`ObserverError::PermissionDenied`] if the gate reports no permission
    /// - [`ObserverError::TargetNotRunning`] if the target cannot be located
    /// - [`ObserverError::AlreadyStopping`] if a stop is still in progress
    #[instrument(skip(self))]
    pub async fn start_monitoring(&self) -> Result<(), ObserverError> {
        if self.stopping.load(Ordering::Acquire) {
            return Err(ObserverError::AlreadyStopping);
        }

        let mut worker = self.worker.lock().await;
        if self.is_monitoring() && worker.task_handle.is_some() {
            debug!("start_monitoring ignored: already monitoring");
            return Ok(());
        }
        // A previous loop may have exited by itself.
        if let Some(handle) = worker.task_handle.take() {
            self.join(handle).await?;
        }

        if !self.gate.has_permission() {
            self.publish(self.current().with_permission(false).with_monitoring(false));
            return Err(ObserverError::PermissionDenied);
        }

        let target = self
            .source
            .locate_target()
            .await
            .map_err(|err| ObserverError::Platform(err.to_string()))?;
        let Some(target) = target else {
            self.publish(MonitoringState::new(false, true, false));
            return Err(ObserverError::TargetNotRunning);
        };

        info!(pid = target.pid, bundle_id = %target.bundle_id, "Starting accessibility observer");

        worker.cancellation = CancellationToken::new();
        self.monitoring.store(true, Ordering::Release);
        self.publish(MonitoringState::new(true, true, true));

        let source = Arc::clone(&self.source);
        let gate = Arc::clone(&self.gate);
        let snapshots = self.snapshots_tx.clone();
        let state_tx = self.state_tx.clone();
        let monitoring = Arc::clone(&self.monitoring);
        let poll_interval = self.config.poll_interval;
        let cancel = worker.cancellation.clone();

        worker.task_handle = Some(tokio::spawn(async move {
            Self::sample_loop(source, gate, snapshots, &state_tx, poll_interval, cancel).await;
            monitoring.store(false, Ordering::Release);
        }));

        Ok(())
    }

    /// Stop sampling and wait for the loop to finish.
    #[instrument(skip(self))]
    pub async fn stop_monitoring(&self) -> Result<(), ObserverError> {
        let mut worker = self.worker.lock().await;
        let Some(handle) = worker.task_handle.take() else {
            self.monitoring.store(false, Ordering::Release);
            return Ok(());
        };

        info!("Stopping accessibility observer");
        self.stopping.store(true, Ordering::Release);
        worker.cancellation.cancel();
        let joined = self.join(handle).await;
        self.stopping.store(false, Ordering::Release);

        self.monitoring.store(false, Ordering::Release);
        self.publish(self.current().with_monitoring(false));
        joined?;

        info!("Accessibility observer stopped");
        Ok(())
    }

    async fn join(&self, handle: JoinHandle<()>) -> Result<(), ObserverError> {
        match tokio::time::timeout(self.config.join_timeout, handle).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                warn!("Observer task panicked: {}", e);
                Err(ObserverError::Platform("observer task panicked".to_string()))
            }
            Err(_) => {
                warn!("Observer task did not complete within timeout");
                Err(ObserverError::Platform("observer task timeout".to_string()))
            }
        }
    }

    fn current(&self) -> MonitoringState {
        *self.state_tx.borrow()
    }

    fn publish(&self, state: MonitoringState) {
        publish_state(&self.state_tx, state);
    }

    async fn sample_loop(
        source: Arc<dyn SnapshotSource>,
        gate: Arc<dyn PermissionGate>,
        snapshots: mpsc::Sender<Snapshot>,
        state_tx: &watch::Sender<MonitoringState>,
        poll_interval: Duration,
        cancel: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(poll_interval.max(MIN_TICK));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("Observer sample loop cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    if let Sample::Exit(state) = Self::sample_once(&*source, &*gate, &snapshots).await {
                        info!(
                            target_running = state.is_target_running,
                            has_permission = state.has_permission,
                            "Observer stopping on its own"
                        );
                        publish_state(state_tx, state);
                        break;
                    }
                }
            }
        }
    }

    async fn sample_once(
        source: &dyn SnapshotSource,
        gate: &dyn PermissionGate,
        snapshots: &mpsc::Sender<Snapshot>,
    ) -> Sample {
        if !gate.has_permission() {
            return Sample::Exit(MonitoringState::new(true, false, false));
        }

        let target: TargetProcess = match source.locate_target().await {
            Ok(Some(target)) => target,
            Ok(None) => return Sample::Exit(MonitoringState::new(false, true, false)),
            Err(err) => {
                warn!(error = %err, "Target lookup failed");
                return Sample::Continue;
            }
        };

        match source.capture(&target).await {
            Ok(snapshot) => {
                if let Err(err) = snapshots.try_send(snapshot) {
                    debug!(error = %err, "Dropping snapshot");
                }
                Sample::Continue
            }
            Err(AgentError::PermissionDenied(_)) => {
                Sample::Exit(MonitoringState::new(true, false, false))
            }
            Err(AgentError::TargetNotRunning(_)) => {
                Sample::Exit(MonitoringState::new(false, true, false))
            }
            Err(err) => {
                warn!(error = %err, pid = target.pid, "Snapshot capture failed");
                Sample::Continue
            }
        }
    }
}

fn publish_state(state_tx: &watch::Sender<MonitoringState>, state: MonitoringState) {
    state_tx.send_if_modified(|current| {
        if *current == state {
            return false;
        }
        debug!(
            target_running = state.is_target_running,
            has_permission = state.has_permission,
            monitoring = state.is_monitoring,
            "Monitoring state changed"
        );
        *current = state;
        true
    });
}

impl Drop for AccessibilityObserver {
    fn drop(&mut self) {
        let worker = self.worker.get_mut();
        if worker.task_handle.is_some() {
            warn!("AccessibilityObserver dropped while running; cancelling task");
            worker.cancellation.cancel();
        }
    }
}
