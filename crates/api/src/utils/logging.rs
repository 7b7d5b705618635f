use std::time::Duration;

use jiffy_domain::{AgentError, LoggingConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `config.level`. Emits JSON lines when
/// `config.json` is set.
///
/// # Errors
/// Returns `AgentError::Config` if the filter directive is invalid or a
/// global subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), AgentError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| {
            AgentError::Config(format!("Invalid log filter '{}': {e}", config.level))
        })?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let installed = if config.json {
        builder.json().with_current_span(false).try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| AgentError::Config(format!("Failed to install tracing subscriber: {e}")))
}

/// Log the outcome of a command execution with structured fields.
///
/// `command` is a stable identifier such as `"monitoring::start_monitoring"`;
/// it must not carry user data.
#[inline]
pub fn log_command_execution(command: &str, elapsed: Duration, success: bool) {
    let duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);

    if success {
        info!(command, duration_ms, "command_execution_success");
    } else {
        warn!(command, duration_ms, "command_execution_failure");
    }
}

/// Convert an `AgentError` into a stable label suitable for logging.
#[inline]
pub const fn error_label(error: &AgentError) -> &'static str {
    match error {
        AgentError::Config(_) => "config",
        AgentError::Platform(_) => "platform",
        AgentError::Network(_) => "network",
        AgentError::Auth(_) => "auth",
        AgentError::PermissionDenied(_) => "permission_denied",
        AgentError::TargetNotRunning(_) => "target_not_running",
        AgentError::InvalidInput(_) => "invalid_input",
        AgentError::Internal(_) => "internal",
    }
}
