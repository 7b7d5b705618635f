//! Error mapping helpers for macOS platform operations
//!
//! - `tokio::task::JoinError` → `AgentError::Internal` (runtime/task errors)
//! - AX API failures → `AgentError::Platform`
//! - Missing trust → `AgentError::PermissionDenied`

use jiffy_domain::AgentError;

/// Map a `tokio::task::JoinError` from a `spawn_blocking` AX call.
///
/// # Examples
///
/// ```rust,ignore
/// tokio::task::spawn_blocking(move || ax_helpers::scan_window(pid, limits))
///     .await
///     .map_err(map_join_error)?;
/// ```
#[inline]
pub(crate) fn map_join_error(err: tokio::task::JoinError) -> AgentError {
    if err.is_cancelled() {
        AgentError::Internal("platform task cancelled".into())
    } else {
        AgentError::Internal(format!("platform task panicked: {err}"))
    }
}

/// Accessibility trust has not been granted to this process.
#[inline]
pub(crate) fn ax_permission_error() -> AgentError {
    AgentError::PermissionDenied(
        "Enable in: System Settings > Privacy & Security > Accessibility".to_string(),
    )
}

/// An AX call returned a non-success code.
#[inline]
pub(crate) fn ax_call_error(operation: &str, code: i32) -> AgentError {
    AgentError::Platform(format!("{operation} failed with AX error {code}"))
}
