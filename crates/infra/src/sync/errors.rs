//! Delivery error types
//!
//! Provides error classification for telemetry delivery with retry metadata.

use std::time::Duration;

use jiffy_domain::AgentError;
use thiserror::Error;

/// Categories of delivery errors for retry logic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryErrorCategory {
    /// Authentication errors (401, 403) - pause and request a refresh
    Authentication,
    /// Rate limiting errors (429) - retry with backoff
    RateLimit,
    /// Server errors (5xx) - retryable
    Server,
    /// Client errors (4xx except auth) - non-retryable
    Client,
    /// Network/connection errors and timeouts - retryable
    Network,
    /// Configuration errors - non-retryable
    Config,
}

/// Telemetry delivery errors
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Client error: {0}")]
    Client(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Operation cancelled")]
    Cancelled,
}

impl DeliveryError {
    /// Get the error category for this error
    pub const fn category(&self) -> DeliveryErrorCategory {
        match self {
            Self::Auth(_) => DeliveryErrorCategory::Authentication,
            Self::RateLimit(_) => DeliveryErrorCategory::RateLimit,
            Self::Server(_) => DeliveryErrorCategory::Server,
            Self::Client(_) => DeliveryErrorCategory::Client,
            Self::Network(_) | Self::Timeout(_) => DeliveryErrorCategory::Network,
            Self::Config(_) | Self::Cancelled => DeliveryErrorCategory::Config,
        }
    }

    /// Check if this error should be retried with backoff.
    ///
    /// Auth failures are not retried here; the dispatcher pauses instead.
    pub const fn should_retry(&self) -> bool {
        matches!(
            self.category(),
            DeliveryErrorCategory::RateLimit
                | DeliveryErrorCategory::Server
                | DeliveryErrorCategory::Network
        )
    }

    /// Minimum delay before the next attempt, in seconds
    pub const fn retry_delay_secs(&self) -> u64 {
        match self.category() {
            DeliveryErrorCategory::Authentication => 5,
            DeliveryErrorCategory::RateLimit => 60,
            DeliveryErrorCategory::Server => 10,
            DeliveryErrorCategory::Network => 5,
            DeliveryErrorCategory::Client | DeliveryErrorCategory::Config => 0,
        }
    }

    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

impl From<DeliveryError> for AgentError {
    fn from(err: DeliveryError) -> Self {
        match err {
            DeliveryError::Auth(message) => Self::Auth(message),
            DeliveryError::Config(message) => Self::Config(message),
            DeliveryError::Client(message) => Self::InvalidInput(message),
            other => Self::Network(other.to_string()),
        }
    }
}
