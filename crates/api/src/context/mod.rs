//! Application context - dependency injection container

use std::sync::Arc;
use std::time::Duration;

use jiffy_core::{AuthContext, PermissionGate, SnapshotSource, StatusHub};
use jiffy_domain::{AgentError, Config, Result};
use jiffy_infra::auth::RefreshHook;
use jiffy_infra::{
    default_permission_gate, default_snapshot_source, AccessibilityObserver, DispatcherConfig,
    EventDispatcher, EventForwarder, KeychainAuthContext, ObserverConfig, TelemetryClient,
    TelemetryClientConfig,
};

use crate::runtime::{AgentRuntime, RuntimeConfig};

const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(3);

/// The replaceable edges of the agent
///
/// Production uses the platform adapters, the keychain and the HTTP client;
/// tests substitute fakes.
pub struct Adapters {
    pub source: Arc<dyn SnapshotSource>,
    pub gate: Arc<dyn PermissionGate>,
    pub auth: Arc<dyn AuthContext>,
    pub forwarder: Arc<dyn EventForwarder>,
}

impl Adapters {
    /// Platform observation, keychain credentials and the telemetry client.
    ///
    /// # Errors
    /// Returns `AgentError::Config` if the HTTP client cannot be built.
    pub fn platform(config: &Config) -> Result<Self> {
        let refresh_hook: RefreshHook = Arc::new(|| {
            tracing::warn!("Telemetry endpoint rejected credentials; sign in again to resume");
        });
        let auth = KeychainAuthContext::from_keychain().with_refresh_hook(refresh_hook);
        let client = TelemetryClient::new(TelemetryClientConfig::from(&config.api))
            .map_err(AgentError::from)?;

        Ok(Self {
            source: default_snapshot_source(&config.monitoring),
            gate: default_permission_gate(&config.monitoring),
            auth: Arc::new(auth),
            forwarder: Arc::new(client),
        })
    }
}

/// Application context - holds all services and dependencies
pub struct AppContext {
    pub config: Config,
    pub observer: Arc<AccessibilityObserver>,
    pub dispatcher: Arc<EventDispatcher>,
    pub status_hub: Arc<StatusHub>,
    pub runtime: Arc<AgentRuntime>,
}

impl AppContext {
    /// Create a context wired to the platform adapters.
    ///
    /// # Errors
    /// See [`Adapters::platform`].
    pub fn new(config: Config) -> Result<Self> {
        let adapters = Adapters::platform(&config)?;
        Ok(Self::with_adapters(config, adapters))
    }

    /// Create a context around caller-supplied adapters.
    pub fn with_adapters(config: Config, adapters: Adapters) -> Self {
        let observer = Arc::new(AccessibilityObserver::new(
            adapters.source,
            Arc::clone(&adapters.gate),
            ObserverConfig::from(&config.monitoring),
        ));
        let dispatcher = Arc::new(EventDispatcher::new(
            adapters.forwarder,
            Arc::clone(&adapters.auth),
            DispatcherConfig::from(&config.dispatch),
        ));
        let status_hub = Arc::new(StatusHub::new());
        let runtime = Arc::new(AgentRuntime::new(
            Arc::clone(&observer),
            adapters.gate,
            adapters.auth,
            Arc::clone(&dispatcher),
            Arc::clone(&status_hub),
            RuntimeConfig::from(&config),
        ));

        Self { config, observer, dispatcher, status_hub, runtime }
    }

    /// Start the delivery worker and the session loop.
    ///
    /// # Errors
    /// Returns `AgentError::Internal` if either is already running.
    pub async fn start(&self) -> Result<()> {
        self.dispatcher.start().await.map_err(AgentError::Internal)?;
        if let Err(err) = self.runtime.start().await {
            if let Err(stop_err) = self.dispatcher.stop().await {
                tracing::warn!(error = %stop_err, "Failed to stop dispatcher after start failure");
            }
            return Err(err);
        }
        tracing::info!("Application context started");
        Ok(())
    }

    /// Stop monitoring, close the session and stop both workers.
    ///
    /// The dispatcher gets a short grace period to drain; events still queued
    /// after that are lost since nothing is persisted.
    ///
    /// # Errors
    /// Returns the first worker shutdown error; later steps still run.
    pub async fn shutdown(&self) -> Result<()> {
        let mut first_error = None;

        if self.runtime.is_running().await {
            if let Err(err) = self.runtime.stop_monitoring().await {
                tracing::warn!(error = %err, "stop_monitoring failed during shutdown");
            }
            if let Err(err) = self.runtime.stop().await {
                tracing::warn!(error = %err, "Runtime stop failed");
                first_error.get_or_insert(err);
            }
        }

        if self.dispatcher.is_running().await {
            self.drain_dispatcher().await;
            if let Err(err) = self.dispatcher.stop().await {
                tracing::warn!(error = %err, "Dispatcher stop failed");
                first_error.get_or_insert(AgentError::Internal(err));
            }
        }

        tracing::info!("Application context shut down");
        first_error.map_or(Ok(()), Err)
    }

    /// Give the final session boundary a chance to leave the queue.
    async fn drain_dispatcher(&self) {
        let drained = tokio::time::timeout(SHUTDOWN_DRAIN_TIMEOUT, async {
            while !self.dispatcher.stats().is_settled() {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
        .await;
        if drained.is_err() {
            let pending = self.dispatcher.stats().pending;
            tracing::warn!(pending, "Shutting down with undelivered events");
        }
    }
}
