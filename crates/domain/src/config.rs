//! Configuration management

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::errors::AgentError;

/// Agent configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub monitoring: MonitoringConfig,
    pub dispatch: DispatchConfig,
    pub logging: LoggingConfig,
}

/// Remote telemetry endpoint configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub events_path: String,
    pub timeout_secs: u64,
}

/// Accessibility observation and session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub target_bundle_id: String,
    pub poll_interval_ms: u64,
    pub permission_cache_ttl_ms: u64,
    pub focus_tick_ms: u64,
    /// Only accrue focus time while the target window is frontmost
    pub require_window_focus: bool,
    pub user_activity_debounce_secs: i64,
}

/// Outbound event queue configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub queue_capacity: usize,
    pub batch_size: usize,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_factor: f64,
    pub auth_pause_secs: u64,
}

/// Log output configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,
    pub json: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        let base_url = if cfg!(debug_assertions) {
            constants::DEBUG_API_BASE_URL
        } else {
            constants::RELEASE_API_BASE_URL
        };
        Self {
            base_url: base_url.to_string(),
            events_path: constants::EVENTS_PATH.to_string(),
            timeout_secs: constants::API_TIMEOUT_SECS,
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            target_bundle_id: constants::TARGET_BUNDLE_ID.to_string(),
            poll_interval_ms: constants::POLL_INTERVAL_MS,
            permission_cache_ttl_ms: constants::PERMISSION_CACHE_TTL_MS,
            focus_tick_ms: constants::FOCUS_TICK_MS,
            require_window_focus: true,
            user_activity_debounce_secs: constants::USER_ACTIVITY_DEBOUNCE_SECS,
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            queue_capacity: constants::DISPATCH_QUEUE_CAPACITY,
            batch_size: constants::DISPATCH_BATCH_SIZE,
            max_attempts: constants::DISPATCH_MAX_ATTEMPTS,
            base_delay_ms: constants::DISPATCH_BASE_DELAY_MS,
            max_delay_ms: constants::DISPATCH_MAX_DELAY_MS,
            jitter_factor: constants::DISPATCH_JITTER_FACTOR,
            auth_pause_secs: constants::DISPATCH_AUTH_PAUSE_SECS,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}

impl Config {
    /// Reject values the workers cannot run with.
    ///
    /// # Errors
    /// Returns `AgentError::Config` naming the first offending field.
    pub fn validate(&self) -> Result<(), AgentError> {
        let zero = [
            ("monitoring.poll_interval_ms", self.monitoring.poll_interval_ms == 0),
            ("monitoring.focus_tick_ms", self.monitoring.focus_tick_ms == 0),
            ("dispatch.queue_capacity", self.dispatch.queue_capacity == 0),
            ("dispatch.batch_size", self.dispatch.batch_size == 0),
            ("dispatch.max_attempts", self.dispatch.max_attempts == 0),
        ];
        match zero.iter().find(|(_, is_zero)| *is_zero) {
            Some((field, _)) => Err(AgentError::Config(format!("{field} must be greater than 0"))),
            None => Ok(()),
        }
    }
}

const fn tick_millis(ms: u64) -> Duration {
    if ms < constants::MIN_TICK_MS {
        Duration::from_millis(constants::MIN_TICK_MS)
    } else {
        Duration::from_millis(ms)
    }
}

impl ApiConfig {
    /// Full URL of the event ingestion endpoint.
    #[must_use]
    pub fn events_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.events_path)
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl MonitoringConfig {
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        tick_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub const fn permission_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.permission_cache_ttl_ms)
    }

    #[must_use]
    pub const fn focus_tick(&self) -> Duration {
        tick_millis(self.focus_tick_ms)
    }
}
