//! Monitoring commands

use std::time::Instant;

use jiffy_domain::{AgentStatus, Result};
use jiffy_infra::DispatcherStats;
use tracing::{info, warn};

use crate::utils::logging::{error_label, log_command_execution};
use crate::AppContext;

/// Start observing the target and open a session
pub async fn start_monitoring(ctx: &AppContext) -> Result<AgentStatus> {
    let command_name = "monitoring::start_monitoring";
    let start = Instant::now();

    info!(command = command_name, "Starting monitoring");
    let result = ctx.runtime.start_monitoring().await;
    if let Err(err) = &result {
        warn!(
            command = command_name,
            error = %err,
            error_type = error_label(err),
            "Monitoring not started"
        );
    }

    log_command_execution(command_name, start.elapsed(), result.is_ok());
    result
}

/// Stop observing and close the active session
pub async fn stop_monitoring(ctx: &AppContext) -> Result<AgentStatus> {
    let command_name = "monitoring::stop_monitoring";
    let start = Instant::now();

    info!(command = command_name, "Stopping monitoring");
    let result = ctx.runtime.stop_monitoring().await;
    if let Err(err) = &result {
        warn!(
            command = command_name,
            error = %err,
            error_type = error_label(err),
            "Stop reported an error"
        );
    }

    log_command_execution(command_name, start.elapsed(), result.is_ok());
    result
}

/// Trigger the OS accessibility prompt. Returns the status as it is now;
/// the outcome arrives with a later status update.
pub fn request_permission(ctx: &AppContext) -> AgentStatus {
    let command_name = "monitoring::request_permission";
    let start = Instant::now();

    ctx.runtime.request_permission();

    log_command_execution(command_name, start.elapsed(), true);
    ctx.runtime.status()
}

pub fn get_status(ctx: &AppContext) -> AgentStatus {
    ctx.runtime.status()
}

pub fn get_dispatcher_stats(ctx: &AppContext) -> DispatcherStats {
    ctx.runtime.dispatcher_stats()
}
