//! Telemetry delivery
//!
//! - `TelemetryClient`: HTTP client for the events endpoint
//! - `EventDispatcher`: bounded in-memory queue plus the delivery worker
//! - `BackoffPolicy`: exponential backoff with jitter
//!
//! The worker follows the same lifecycle rules as the observer: join handles
//! are tracked, cancellation is explicit, and every network call is wrapped
//! in a timeout.

pub mod dispatcher;
mod errors;
pub mod retry;
pub mod telemetry_client;

pub use dispatcher::{DispatcherConfig, DispatcherStats, EventDispatcher, EventForwarder};
pub use errors::{DeliveryError, DeliveryErrorCategory};
pub use retry::BackoffPolicy;
pub use telemetry_client::{TelemetryClient, TelemetryClientConfig};
