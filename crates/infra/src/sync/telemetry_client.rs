//! Telemetry endpoint client
//!
//! Posts batches of sequenced activity events to `{base_url}{events_path}`
//! with a bearer token and a per-batch idempotency key. Every request is
//! wrapped in a timeout; an elapsed timeout is reported as
//! [`DeliveryError::Timeout`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use jiffy_core::QueuedEvent;
use jiffy_domain::constants::{APP_NAME, APP_VERSION};
use jiffy_domain::{ApiConfig, EventType, Identity, PayloadHint};
use reqwest::StatusCode;
use serde::Serialize;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::errors::DeliveryError;

/// Configuration for the telemetry client
#[derive(Debug, Clone)]
pub struct TelemetryClientConfig {
    /// Full URL of the events endpoint
    pub events_url: String,
    /// Timeout for a single request
    pub timeout: Duration,
    /// Identifies this agent process in idempotency keys
    pub instance_id: Uuid,
}

impl Default for TelemetryClientConfig {
    fn default() -> Self {
        Self::from(&ApiConfig::default())
    }
}

impl From<&ApiConfig> for TelemetryClientConfig {
    fn from(config: &ApiConfig) -> Self {
        Self {
            events_url: config.events_url(),
            timeout: config.timeout(),
            instance_id: Uuid::now_v7(),
        }
    }
}

#[derive(Serialize)]
struct AgentInfo {
    name: &'static str,
    version: &'static str,
    instance_id: Uuid,
}

#[derive(Serialize)]
struct WireEvent<'a> {
    sequence_id: u64,
    event_type: EventType,
    timestamp: DateTime<Utc>,
    source: &'a str,
    metadata: &'a PayloadHint,
}

#[derive(Serialize)]
struct EventEnvelope<'a> {
    user_id: &'a str,
    agent: AgentInfo,
    events: Vec<WireEvent<'a>>,
}

/// HTTP client for the telemetry endpoint
pub struct TelemetryClient {
    http: reqwest::Client,
    config: TelemetryClientConfig,
}

impl TelemetryClient {
    /// # Errors
    /// Returns `DeliveryError::Config` if the HTTP client cannot be built.
    pub fn new(config: TelemetryClientConfig) -> Result<Self, DeliveryError> {
        let http = reqwest::Client::builder()
            .user_agent(format!("jiffy-agent/{APP_VERSION}"))
            .build()
            .map_err(|e| DeliveryError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    pub const fn config(&self) -> &TelemetryClientConfig {
        &self.config
    }

    /// `<instance_id>:<first_seq>-<last_seq>`
    pub fn idempotency_key(&self, batch: &[QueuedEvent]) -> String {
        let first = batch.first().map_or(0, |e| e.sequence_id);
        let last = batch.last().map_or(0, |e| e.sequence_id);
        format!("{}:{first}-{last}", self.config.instance_id)
    }

    /// POST one batch.
    ///
    /// # Errors
    /// Maps 401/403 to `Auth`, 429 to `RateLimit`, 5xx to `Server`, other
    /// 4xx to `Client`, transport failures to `Network` and an elapsed
    /// timeout to `Timeout`.
    #[instrument(skip(self, identity, batch), fields(count = batch.len()))]
    pub async fn post_events(
        &self,
        identity: &Identity,
        batch: &[QueuedEvent],
    ) -> Result<(), DeliveryError> {
        let envelope = EventEnvelope {
            user_id: &identity.user_id,
            agent: AgentInfo {
                name: APP_NAME,
                version: APP_VERSION,
                instance_id: self.config.instance_id,
            },
            events: batch
                .iter()
                .map(|queued| WireEvent {
                    sequence_id: queued.sequence_id,
                    event_type: queued.event.event_type,
                    timestamp: queued.event.timestamp,
                    source: &queued.event.source,
                    metadata: &queued.event.hint,
                })
                .collect(),
        };

        let url = &self.config.events_url;
        let idempotency_key = self.idempotency_key(batch);
        debug!(url = %url, idempotency_key = %idempotency_key, "POST events");

        let request = self
            .http
            .post(url)
            .header("Authorization", format!("Bearer {}", identity.token))
            .header("Content-Type", "application/json")
            .header("X-Idempotency-Key", idempotency_key)
            .json(&envelope);

        let timeout = self.config.timeout;
        let response = match tokio::time::timeout(timeout, request.send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => return Err(DeliveryError::Network(err.to_string())),
            Err(_) => return Err(DeliveryError::Timeout(timeout)),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status_error(status, url, &body));
        }

        debug!(status = %status, "Events accepted");
        Ok(())
    }
}

fn map_status_error(status: StatusCode, url: &str, body: &str) -> DeliveryError {
    let message = if body.is_empty() {
        format!("{url} returned status {status}")
    } else {
        format!("{url} returned status {status}: {body}")
    };

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        DeliveryError::Auth(message)
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        DeliveryError::RateLimit(message)
    } else if status.is_server_error() {
        DeliveryError::Server(message)
    } else {
        DeliveryError::Client(message)
    }
}
