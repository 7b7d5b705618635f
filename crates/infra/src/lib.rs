//! # Jiffy Infrastructure
//!
//! Infrastructure implementations of core ports.
//!
//! This crate contains:
//! - Platform adapters (macOS Accessibility API, NSWorkspace)
//! - The accessibility observer worker
//! - Telemetry delivery (HTTP client, dispatcher worker, backoff)
//! - Keychain-backed auth context
//! - Configuration loading
//!
//! ## Architecture
//! - Implements traits defined in `jiffy-core`
//! - Contains all "impure" code (I/O, platform APIs, network)

pub mod auth;
pub mod config;
pub mod observer;
pub mod platform;
pub mod sync;

// Re-export commonly used items
pub use auth::KeychainAuthContext;
pub use observer::{AccessibilityObserver, ObserverConfig, ObserverError};
pub use platform::{default_permission_gate, default_snapshot_source};
pub use sync::{
    DeliveryError, DispatcherConfig, DispatcherStats, EventDispatcher, EventForwarder,
    TelemetryClient, TelemetryClientConfig,
};
