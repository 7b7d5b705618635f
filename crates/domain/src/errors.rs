//! Error types used throughout the agent

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the agent
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Accessibility permission denied: {0}")]
    PermissionDenied(String),

    #[error("Target application not running: {0}")]
    TargetNotRunning(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;
