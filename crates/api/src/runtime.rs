//! Agent runtime: the session loop and the presentation boundary
//!
//! The session loop owns the [`SessionManager`] and the [`EventClassifier`].
//! It selects over observer snapshots, the monitoring-state watch, a focus
//! tick and a presence probe, and publishes [`AgentStatus`] to the hub after
//! every change. Commands that touch the session travel to the loop over a
//! channel, so nothing outside the loop ever holds the session.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use jiffy_core::{
    AuthContext, ClassifierState, EventClassifier, EventSink, FocusGate, PermissionGate,
    SessionManager, StatusHub, StatusObserver, SubscriptionId,
};
use jiffy_domain::constants::{MIN_TICK_MS, WORKER_JOIN_TIMEOUT_SECS};
use jiffy_domain::{
    AgentError, AgentStatus, Config, MonitoringState, Result, Session, SessionState, Snapshot,
};
use jiffy_infra::{AccessibilityObserver, DispatcherStats, EventDispatcher};
use tokio::sync::{mpsc, oneshot, watch, Mutex as TokioMutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

const COMMAND_CHANNEL_CAPACITY: usize = 8;
const MIN_TICK: Duration = Duration::from_millis(MIN_TICK_MS);

/// Timing and gating for the session loop.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Focus time is accrued in steps of this size
    pub focus_tick: Duration,
    /// How often presence and permission are re-probed while not monitoring
    pub presence_interval: Duration,
    pub require_window_focus: bool,
    pub user_activity_debounce: chrono::Duration,
    pub join_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for RuntimeConfig {
    fn from(config: &Config) -> Self {
        Self {
            focus_tick: config.monitoring.focus_tick(),
            presence_interval: config.monitoring.poll_interval(),
            require_window_focus: config.monitoring.require_window_focus,
            user_activity_debounce: chrono::Duration::seconds(
                config.monitoring.user_activity_debounce_secs,
            ),
            join_timeout: Duration::from_secs(WORKER_JOIN_TIMEOUT_SECS),
        }
    }
}

enum SessionCommand {
    Start(oneshot::Sender<bool>),
    End(oneshot::Sender<Option<Session>>),
}

struct Worker {
    cancellation: CancellationToken,
    commands: Option<mpsc::Sender<SessionCommand>>,
    snapshots: Option<mpsc::Receiver<Snapshot>>,
    task_handle: Option<JoinHandle<mpsc::Receiver<Snapshot>>>,
}

pub struct AgentRuntime {
    observer: Arc<AccessibilityObserver>,
    gate: Arc<dyn PermissionGate>,
    auth: Arc<dyn AuthContext>,
    dispatcher: Arc<EventDispatcher>,
    hub: Arc<StatusHub>,
    config: RuntimeConfig,
    worker: TokioMutex<Worker>,
}

impl AgentRuntime {
    pub fn new(
        observer: Arc<AccessibilityObserver>,
        gate: Arc<dyn PermissionGate>,
        auth: Arc<dyn AuthContext>,
        dispatcher: Arc<EventDispatcher>,
        hub: Arc<StatusHub>,
        config: RuntimeConfig,
    ) -> Self {
        Self {
            observer,
            gate,
            auth,
            dispatcher,
            hub,
            config,
            worker: TokioMutex::new(Worker {
                cancellation: CancellationToken::new(),
                commands: None,
                snapshots: None,
                task_handle: None,
            }),
        }
    }

    /// Spawn the session loop.
    ///
    /// # Errors
    /// Returns `AgentError::Internal` if the loop is already running or the
    /// observer's snapshot stream was claimed by someone else.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<()> {
        let mut worker = self.worker.lock().await;
        if worker.task_handle.is_some() {
            return Err(AgentError::Internal("Runtime already running".to_string()));
        }

        let snapshots = worker
            .snapshots
            .take()
            .or_else(|| self.observer.subscribe_snapshots())
            .ok_or_else(|| AgentError::Internal("Snapshot stream already claimed".to_string()))?;

        info!("Starting agent runtime");

        worker.cancellation = CancellationToken::new();
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        worker.commands = Some(commands_tx);

        let sink: Arc<dyn EventSink> = self.dispatcher.clone();
        let session_loop = SessionLoop::new(
            Arc::clone(&self.observer),
            Arc::clone(&self.hub),
            sink,
            Arc::clone(&self.auth),
            self.config.clone(),
        );
        let cancel = worker.cancellation.clone();
        worker.task_handle =
            Some(tokio::spawn(session_loop.run(snapshots, commands_rx, cancel)));

        info!("Agent runtime started");
        Ok(())
    }

    /// Stop the session loop. An active session is ended first.
    ///
    /// # Errors
    /// Returns `AgentError::Internal` if the loop is not running, panicked or
    /// did not finish within the join timeout.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> Result<()> {
        let mut worker = self.worker.lock().await;
        let Some(handle) = worker.task_handle.take() else {
            return Err(AgentError::Internal("Runtime not running".to_string()));
        };

        info!("Stopping agent runtime");
        worker.commands = None;
        worker.cancellation.cancel();

        match tokio::time::timeout(self.config.join_timeout, handle).await {
            Ok(Ok(snapshots)) => worker.snapshots = Some(snapshots),
            Ok(Err(e)) => {
                warn!("Session loop panicked: {}", e);
                return Err(AgentError::Internal("Session loop panicked".to_string()));
            }
            Err(_) => {
                warn!("Session loop did not complete within timeout");
                return Err(AgentError::Internal("Session loop timeout".to_string()));
            }
        }

        info!("Agent runtime stopped");
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.worker.lock().await.task_handle.is_some()
    }

    /// Start observing the target and open a session.
    ///
    /// # Errors
    /// - `AgentError::Auth` when no user is signed in
    /// - `AgentError::PermissionDenied` / `AgentError::TargetNotRunning` when
    ///   the observer cannot start; the same facts show up in the status
    /// - `AgentError::Internal` if the runtime is not running
    #[instrument(skip(self))]
    pub async fn start_monitoring(&self) -> Result<AgentStatus> {
        let commands = self.commands().await?;
        if self.auth.current_identity().await.is_none() {
            return Err(AgentError::Auth("Not signed in".to_string()));
        }
        self.observer.start_monitoring().await.map_err(AgentError::from)?;
        if !request(&commands, SessionCommand::Start).await? {
            debug!("start_monitoring: no new session opened");
        }
        Ok(self.status())
    }

    /// Stop observing and close the active session, if any.
    ///
    /// # Errors
    /// Returns `AgentError::Internal` if the runtime is not running or the
    /// observer did not stop cleanly. The session is closed either way.
    #[instrument(skip(self))]
    pub async fn stop_monitoring(&self) -> Result<AgentStatus> {
        let stopped = self.observer.stop_monitoring().await.map_err(AgentError::from);
        let commands = self.commands().await?;
        if let Some(session) = request(&commands, SessionCommand::End).await? {
            debug!(session_id = %session.id(), "Session closed by stop_monitoring");
        }
        stopped?;
        Ok(self.status())
    }

    /// Ask the OS for accessibility permission. The answer arrives through a
    /// later status update.
    pub fn request_permission(&self) {
        info!("Requesting accessibility permission");
        self.gate.request_permission();
    }

    pub fn status(&self) -> AgentStatus {
        self.hub.latest()
    }

    pub fn subscribe(&self, observer: Arc<dyn StatusObserver>) -> SubscriptionId {
        self.hub.subscribe(observer)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.hub.unsubscribe(id)
    }

    pub fn dispatcher_stats(&self) -> DispatcherStats {
        self.dispatcher.stats()
    }

    async fn commands(&self) -> Result<mpsc::Sender<SessionCommand>> {
        self.worker
            .lock()
            .await
            .commands
            .clone()
            .ok_or_else(|| AgentError::Internal("Runtime not running".to_string()))
    }
}

/// Send `command` to the session loop and wait for its reply.
async fn request<T>(
    commands: &mpsc::Sender<SessionCommand>,
    command: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
) -> Result<T> {
    let (reply_tx, reply_rx) = oneshot::channel();
    commands
        .send(command(reply_tx))
        .await
        .map_err(|_| AgentError::Internal("Session loop stopped".to_string()))?;
    reply_rx.await.map_err(|_| AgentError::Internal("Session loop dropped the command".to_string()))
}

impl Drop for AgentRuntime {
    fn drop(&mut self) {
        let worker = self.worker.get_mut();
        if worker.task_handle.is_some() {
            warn!("AgentRuntime dropped while running; cancelling session loop");
            worker.cancellation.cancel();
        }
    }
}

/// State owned by the spawned session task
struct SessionLoop {
    observer: Arc<AccessibilityObserver>,
    hub: Arc<StatusHub>,
    sink: Arc<dyn EventSink>,
    auth: Arc<dyn AuthContext>,
    manager: SessionManager,
    classifier: EventClassifier,
    config: RuntimeConfig,
    state_rx: watch::Receiver<MonitoringState>,
    state: MonitoringState,
    window_focused: bool,
}

impl SessionLoop {
    fn new(
        observer: Arc<AccessibilityObserver>,
        hub: Arc<StatusHub>,
        sink: Arc<dyn EventSink>,
        auth: Arc<dyn AuthContext>,
        config: RuntimeConfig,
    ) -> Self {
        let mut state_rx = observer.monitoring_state();
        let state = *state_rx.borrow_and_update();
        let manager = SessionManager::new(Arc::clone(&sink))
            .with_focus_gating(config.require_window_focus);
        let classifier =
            EventClassifier::new(ClassifierState::with_debounce(config.user_activity_debounce));
        Self {
            observer,
            hub,
            sink,
            auth,
            manager,
            classifier,
            config,
            state_rx,
            state,
            window_focused: false,
        }
    }

    async fn run(
        mut self,
        mut snapshots: mpsc::Receiver<Snapshot>,
        mut commands: mpsc::Receiver<SessionCommand>,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<Snapshot> {
        let focus_tick = self.config.focus_tick.max(MIN_TICK);
        let mut focus_ticker = tokio::time::interval_at(Instant::now() + focus_tick, focus_tick);
        focus_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut presence = tokio::time::interval(self.config.presence_interval.max(MIN_TICK));
        presence.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.publish();

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!("Session loop cancelled");
                    break;
                }
                Some(command) = commands.recv() => self.handle_command(command).await,
                changed = self.state_rx.changed() => {
                    if changed.is_err() {
                        warn!("Monitoring state channel closed; session loop exiting");
                        break;
                    }
                    let next = *self.state_rx.borrow_and_update();
                    self.on_state(next);
                }
                Some(snapshot) = snapshots.recv() => self.on_snapshot(snapshot),
                _ = focus_ticker.tick() => self.on_focus_tick().await,
                _ = presence.tick() => {
                    if !self.observer.is_monitoring() {
                        self.observer.probe().await;
                    }
                }
            }
        }

        if self.end_session().is_some() {
            self.publish();
        }
        snapshots
    }

    async fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Start(reply) => {
                // The observer publishes before the command is sent.
                let latest = *self.state_rx.borrow_and_update();
                self.on_state(latest);
                let started = self.state.is_monitoring
                    && self.is_authenticated().await
                    && self.manager.start_session(Utc::now());
                self.publish();
                let _ = reply.send(started);
            }
            SessionCommand::End(reply) => {
                let ended = self.end_session();
                self.publish();
                let _ = reply.send(ended);
            }
        }
    }

    fn end_session(&mut self) -> Option<Session> {
        self.settle_pending_response();
        let ended = self.manager.end_session(Utc::now());
        if ended.is_some() {
            self.forget_window();
        }
        ended
    }

    /// A reply still marked pending is counted before its session closes.
    fn settle_pending_response(&mut self) {
        if self.manager.state() != SessionState::Active {
            return;
        }
        if let Some(event) = self.classifier.flush_pending(Utc::now()) {
            self.manager.record(&event);
            self.sink.enqueue(event);
        }
    }

    fn forget_window(&mut self) {
        self.classifier.reset();
        self.window_focused = false;
    }

    fn on_state(&mut self, next: MonitoringState) {
        if !next.is_monitoring {
            self.settle_pending_response();
        }
        let previous = std::mem::replace(&mut self.state, next);
        if self.manager.on_monitoring_state(previous, next, Utc::now()).is_some() {
            self.forget_window();
        }
        self.publish();
    }

    fn on_snapshot(&mut self, snapshot: Snapshot) {
        self.window_focused = snapshot.is_focused();
        if self.manager.state() != SessionState::Active {
            debug!("Snapshot ignored: no active session");
            return;
        }

        for event in self.classifier.observe(snapshot) {
            self.manager.record(&event);
            self.sink.enqueue(event);
        }
        self.publish();
    }

    async fn is_authenticated(&self) -> bool {
        self.auth.current_identity().await.is_some()
    }

    async fn on_focus_tick(&mut self) {
        if self.manager.state() != SessionState::Active {
            return;
        }
        let authenticated = self.is_authenticated().await;
        let gate = FocusGate::from_state(self.state, self.window_focused, authenticated);
        if self.manager.tick(self.config.focus_tick, &gate) {
            self.publish();
        }
    }

    fn publish(&self) {
        self.hub.publish(AgentStatus::from_parts(self.state, self.manager.current()));
    }
}
