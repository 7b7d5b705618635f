//! Configuration loader
//!
//! Loads agent configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. Attempts to load from environment variables (`JIFFY_API_BASE_URL`
//!    must be set, everything else is optional)
//! 2. Otherwise falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `JIFFY_API_BASE_URL`: Telemetry endpoint base URL (required)
//! - `JIFFY_API_TIMEOUT_SECS`: Per-request timeout in seconds
//! - `JIFFY_POLL_INTERVAL_MS`: Snapshot interval in milliseconds
//! - `JIFFY_REQUIRE_WINDOW_FOCUS`: Only count focus time while frontmost
//! - `JIFFY_QUEUE_CAPACITY`: Outbound event queue capacity
//! - `JIFFY_MAX_ATTEMPTS`: Delivery attempts per batch
//! - `JIFFY_LOG_LEVEL`: Default log filter
//! - `JIFFY_LOG_JSON`: Emit JSON logs (true/false)
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./jiffy-agent.toml` or `./jiffy-agent.json`
//! 2. `./config.toml` or `./config.json`
//! 3. The same names next to the executable

use std::path::{Path, PathBuf};
use std::str::FromStr;

use jiffy_domain::{AgentError, Config, Result};

const CONFIG_FILE_NAMES: [&str; 4] =
    ["jiffy-agent.toml", "jiffy-agent.json", "config.toml", "config.json"];

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `AgentError::Config` if neither the environment nor a config
/// file yields a valid configuration.
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// Unset optional variables keep their defaults.
///
/// # Errors
/// Returns `AgentError::Config` if `JIFFY_API_BASE_URL` is missing or a
/// numeric variable does not parse or is zero where a period is expected.
pub fn load_from_env() -> Result<Config> {
    let mut config = Config::default();

    config.api.base_url = env_var("JIFFY_API_BASE_URL")?;
    if let Some(timeout) = env_parse::<u64>("JIFFY_API_TIMEOUT_SECS")? {
        config.api.timeout_secs = timeout;
    }

    if let Some(interval) = env_parse::<u64>("JIFFY_POLL_INTERVAL_MS")? {
        config.monitoring.poll_interval_ms = interval;
    }
    config.monitoring.require_window_focus =
        env_bool("JIFFY_REQUIRE_WINDOW_FOCUS", config.monitoring.require_window_focus);

    if let Some(capacity) = env_parse::<usize>("JIFFY_QUEUE_CAPACITY")? {
        config.dispatch.queue_capacity = capacity;
    }
    if let Some(attempts) = env_parse::<u32>("JIFFY_MAX_ATTEMPTS")? {
        config.dispatch.max_attempts = attempts;
    }

    if let Ok(level) = std::env::var("JIFFY_LOG_LEVEL") {
        config.logging.level = level;
    }
    config.logging.json = env_bool("JIFFY_LOG_JSON", config.logging.json);

    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations via
/// [`probe_config_paths`]. Format is chosen by file extension.
///
/// # Errors
/// Returns `AgentError::Config` if the file is missing, unreadable,
/// malformed or sets a timer period or queue size to zero.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(AgentError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            AgentError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| AgentError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    let config: Config = match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| AgentError::Config(format!("Invalid TOML format: {e}")))?,
        "json" => serde_json::from_str(contents)
            .map_err(|e| AgentError::Config(format!("Invalid JSON format: {e}")))?,
        _ => return Err(AgentError::Config(format!("Unsupported config format: {extension}"))),
    };
    config.validate()?;
    Ok(config)
}

/// First existing config file in the working directory or next to the
/// executable.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd);
    }
    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf))
    {
        dirs.push(exe_dir);
    }

    dirs.iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.exists())
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| AgentError::Config(format!("Missing required environment variable: {key}")))
}

/// `Ok(None)` when unset.
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| AgentError::Config(format!("Invalid value for {key}: {e}"))),
        Err(_) => Ok(None),
    }
}

/// Accepts `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive).
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use once_cell::sync::Lazy;
    use tempfile::NamedTempFile;

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const ALL_VARS: [&str; 8] = [
        "JIFFY_API_BASE_URL",
        "JIFFY_API_TIMEOUT_SECS",
        "JIFFY_POLL_INTERVAL_MS",
        "JIFFY_REQUIRE_WINDOW_FOCUS",
        "JIFFY_QUEUE_CAPACITY",
        "JIFFY_MAX_ATTEMPTS",
        "JIFFY_LOG_LEVEL",
        "JIFFY_LOG_JSON",
    ];

    fn clear_env() {
        for key in ALL_VARS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_env_bool_parsing() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");

        for value in ["1", "true", "yes", "on", "TRUE"] {
            std::env::set_var("JIFFY_TEST_BOOL", value);
            assert!(env_bool("JIFFY_TEST_BOOL", false), "{value} should be true");
        }
        for value in ["0", "false", "no", "off"] {
            std::env::set_var("JIFFY_TEST_BOOL", value);
            assert!(!env_bool("JIFFY_TEST_BOOL", true), "{value} should be false");
        }

        std::env::remove_var("JIFFY_TEST_BOOL");
        assert!(env_bool("JIFFY_TEST_BOOL", true));
        assert!(!env_bool("JIFFY_TEST_BOOL", false));
    }

    #[test]
    fn test_load_from_env_all_vars_set() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var("JIFFY_API_BASE_URL", "https://telemetry.test");
        std::env::set_var("JIFFY_API_TIMEOUT_SECS", "3");
        std::env::set_var("JIFFY_POLL_INTERVAL_MS", "500");
        std::env::set_var("JIFFY_REQUIRE_WINDOW_FOCUS", "false");
        std::env::set_var("JIFFY_QUEUE_CAPACITY", "64");
        std::env::set_var("JIFFY_MAX_ATTEMPTS", "4");
        std::env::set_var("JIFFY_LOG_LEVEL", "debug");
        std::env::set_var("JIFFY_LOG_JSON", "yes");

        let result = load_from_env();
        clear_env();

        let config = result.expect("config from env");
        assert_eq!(config.api.base_url, "https://telemetry.test");
        assert_eq!(config.api.timeout_secs, 3);
        assert_eq!(config.monitoring.poll_interval_ms, 500);
        assert!(!config.monitoring.require_window_focus);
        assert_eq!(config.dispatch.queue_capacity, 64);
        assert_eq!(config.dispatch.max_attempts, 4);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }

    #[test]
    fn test_load_from_env_keeps_defaults_for_unset_vars() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        std::env::set_var("JIFFY_API_BASE_URL", "https://telemetry.test");

        let result = load_from_env();
        clear_env();

        let config = result.expect("config from env");
        let defaults = Config::default();
        assert_eq!(config.monitoring, defaults.monitoring);
        assert_eq!(config.dispatch, defaults.dispatch);
        assert_eq!(config.api.events_path, defaults.api.events_path);
    }

    #[test]
    fn test_load_from_env_missing_var() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        let err = load_from_env().unwrap_err();
        assert!(matches!(err, AgentError::Config(_)), "Should be a Config error");
        assert!(err.to_string().contains("JIFFY_API_BASE_URL"));
    }

    #[test]
    fn test_load_from_env_invalid_number() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        std::env::set_var("JIFFY_API_BASE_URL", "https://telemetry.test");
        std::env::set_var("JIFFY_QUEUE_CAPACITY", "lots");

        let result = load_from_env();
        clear_env();

        let err = result.unwrap_err();
        assert!(matches!(err, AgentError::Config(_)));
        assert!(err.to_string().contains("JIFFY_QUEUE_CAPACITY"));
    }

    #[test]
    fn test_load_from_env_zero_poll_interval() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        std::env::set_var("JIFFY_API_BASE_URL", "https://telemetry.test");
        std::env::set_var("JIFFY_POLL_INTERVAL_MS", "0");

        let result = load_from_env();
        clear_env();

        let err = result.unwrap_err();
        assert!(matches!(err, AgentError::Config(_)));
        assert!(err.to_string().contains("poll_interval_ms"));
    }

    #[test]
    fn test_load_from_file_zero_focus_tick() {
        let path = write_temp("[monitoring]\nfocus_tick_ms = 0\n", "toml");
        let result = load_from_file(Some(path.clone()));
        std::fs::remove_file(&path).ok();

        let err = result.unwrap_err();
        assert!(matches!(err, AgentError::Config(_)));
        assert!(err.to_string().contains("focus_tick_ms"));
    }

    fn write_temp(contents: &str, extension: &str) -> PathBuf {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(contents.as_bytes()).unwrap();
        let path = temp_file.path().with_extension(extension);
        std::fs::copy(temp_file.path(), &path).unwrap();
        path
    }

    #[test]
    fn test_load_from_file_json() {
        let path = write_temp(
            r#"{
                "api": { "base_url": "https://json.test", "timeout_secs": 7 },
                "dispatch": { "batch_size": 5 }
            }"#,
            "json",
        );

        let result = load_from_file(Some(path.clone()));
        std::fs::remove_file(path).ok();

        let config = result.expect("config from JSON file");
        assert_eq!(config.api.base_url, "https://json.test");
        assert_eq!(config.api.timeout_secs, 7);
        assert_eq!(config.dispatch.batch_size, 5);
    }

    #[test]
    fn test_load_from_file_toml() {
        let path = write_temp(
            r#"
[api]
base_url = "https://toml.test"

[monitoring]
poll_interval_ms = 1000
require_window_focus = false

[logging]
json = true
"#,
            "toml",
        );

        let result = load_from_file(Some(path.clone()));
        std::fs::remove_file(path).ok();

        let config = result.expect("config from TOML file");
        assert_eq!(config.api.base_url, "https://toml.test");
        assert_eq!(config.monitoring.poll_interval_ms, 1000);
        assert!(!config.monitoring.require_window_focus);
        assert!(config.logging.json);
    }

    #[test]
    fn test_load_from_file_not_found() {
        let err = load_from_file(Some(PathBuf::from("/nonexistent/jiffy-agent.toml"))).unwrap_err();
        assert!(matches!(err, AgentError::Config(_)));
    }

    #[test]
    fn test_load_from_file_invalid_json() {
        let path = write_temp(r#"{ "api": "#, "json");

        let result = load_from_file(Some(path.clone()));
        std::fs::remove_file(path).ok();

        assert!(matches!(result, Err(AgentError::Config(_))));
    }

    #[test]
    fn test_parse_config_unsupported_extension() {
        let err = parse_config("api: {}", Path::new("config.yaml")).unwrap_err();
        assert!(err.to_string().contains("yaml"));
    }
}
