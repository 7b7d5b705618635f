//! Application constants
//!
//! Centralized location for all domain-level constants used throughout the
//! agent. Wire values must stay in sync with the telemetry endpoint.

// Application identity
pub const APP_NAME: &str = "Jiffy Desktop Agent";
pub const APP_VERSION: &str = "1.0.0";

// Remote API
pub const DEBUG_API_BASE_URL: &str = "http://localhost:3000/api";
pub const RELEASE_API_BASE_URL: &str = "https://platform-jiffylabs.vercel.app/api";
pub const EVENTS_PATH: &str = "/events";
pub const API_TIMEOUT_SECS: u64 = 15;

// Event type wire names
pub const EVENT_AI_PROMPT_SUBMITTED: &str = "ai_prompt_submitted";
pub const EVENT_AI_RESPONSE_RECEIVED: &str = "ai_response_received";
pub const EVENT_AI_VISIT: &str = "ai_visit";
pub const EVENT_USER_ACTIVITY: &str = "user_activity";
pub const EVENT_SESSION_STARTED: &str = "session_started";
pub const EVENT_SESSION_ENDED: &str = "session_ended";

// Event sources
pub const SOURCE_CLAUDE_DESKTOP: &str = "claude_desktop";

// Tracked application
pub const TARGET_BUNDLE_ID: &str = "com.anthropic.claudefordesktop";
pub const TARGET_APP_NAME: &str = "Claude";

// Keychain
pub const KEYCHAIN_SERVICE: &str = "com.jiffylabs.desktop-agent";
pub const KEYCHAIN_AUTH_TOKEN_KEY: &str = "jiffy_auth_token";
pub const KEYCHAIN_USER_ID_KEY: &str = "jiffy_user_id";

// Observation
pub const POLL_INTERVAL_MS: u64 = 2_000;
pub const PERMISSION_CACHE_TTL_MS: u64 = 2_000;
/// Floor for every timer period; tokio rejects a zero period
pub const MIN_TICK_MS: u64 = 10;
pub const SNAPSHOT_CHANNEL_CAPACITY: usize = 16;
pub const MAX_AX_TREE_DEPTH: usize = 48;
pub const MAX_AX_TREE_NODES: usize = 4_000;

// Classification
pub const USER_ACTIVITY_DEBOUNCE_SECS: i64 = 30;

// Sessions
pub const FOCUS_TICK_MS: u64 = 1_000;

// Delivery
pub const DISPATCH_QUEUE_CAPACITY: usize = 512;
pub const DISPATCH_BATCH_SIZE: usize = 25;
pub const DISPATCH_MAX_ATTEMPTS: u32 = 5;
pub const DISPATCH_BASE_DELAY_MS: u64 = 1_000;
pub const DISPATCH_MAX_DELAY_MS: u64 = 60_000;
pub const DISPATCH_JITTER_FACTOR: f64 = 0.3;
pub const DISPATCH_AUTH_PAUSE_SECS: u64 = 30;
pub const WORKER_JOIN_TIMEOUT_SECS: u64 = 5;
