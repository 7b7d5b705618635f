//! Jiffy Desktop Agent
//!
//! Headless entry point: loads configuration, starts the agent and monitors
//! Claude Desktop whenever it is running and readable.

use anyhow::Context;
use jiffy_api::utils::logging::init_tracing;
use jiffy_api::{commands, AppContext};
use jiffy_domain::constants::APP_VERSION;
use jiffy_domain::{AgentError, Config};
use jiffy_infra::config;
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = dotenvy::dotenv();
    let (config, config_error) = match config::load() {
        Ok(config) => (config, None),
        Err(err) => (Config::default(), Some(err)),
    };

    // Initialize logging before anything else reports
    init_tracing(&config.logging).context("failed to initialize logging")?;

    match dotenv {
        Ok(path) => info!(path = %path.display(), "Loaded .env"),
        Err(e) => debug!(error = %e, "No .env file loaded"),
    }
    if let Some(err) = config_error {
        warn!(error = %err, "No configuration found; using defaults");
    }

    info!(version = APP_VERSION, "Jiffy Desktop Agent starting");

    let ctx = AppContext::new(config).context("failed to build application context")?;
    ctx.start().await.context("failed to start agent")?;

    let initial = ctx.observer.probe().await;
    if !initial.has_permission {
        info!("Accessibility permission missing; prompting");
        commands::request_permission(&ctx);
    }

    let mut auto_start = tokio::time::interval(ctx.config.monitoring.poll_interval());
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(err) = signal {
                    warn!(error = %err, "Failed to listen for shutdown signal");
                }
                break;
            }
            _ = auto_start.tick() => {
                let status = commands::get_status(&ctx);
                if status.monitoring_state().can_monitor() && !status.is_monitoring {
                    match commands::start_monitoring(&ctx).await {
                        Ok(_) | Err(AgentError::TargetNotRunning(_)) => {}
                        Err(err) => debug!(error = %err, "Auto-start deferred"),
                    }
                }
            }
        }
    }

    info!("Shutdown requested");
    ctx.shutdown().await.context("shutdown failed")?;
    info!("Jiffy Desktop Agent stopped");
    Ok(())
}
