//! # Jiffy Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port/adapter interfaces (traits) for observation, auth and delivery
//! - Snapshot classification into activity events
//! - The session state machine and focus-time accounting
//! - The bounded outbound queue policy
//! - The presentation status hub
//!
//! ## Architecture Principles
//! - Only depends on `jiffy-domain`
//! - No HTTP, keychain or platform code
//! - All external dependencies via traits
//! - Pure, testable business logic

pub mod auth;
pub mod classifier;
pub mod dispatch;
pub mod observation;
pub mod session;
pub mod status;

// Re-export specific items to avoid ambiguity
pub use auth::ports::AuthContext;
pub use classifier::{classify, Classification, ClassifierState, EventClassifier};
pub use dispatch::ports::EventSink;
pub use dispatch::queue::{EventQueue, PushOutcome, QueuedEvent};
pub use observation::ports::{PermissionGate, SnapshotSource, TargetProcess};
pub use session::{FocusGate, SessionManager};
pub use status::{StatusHub, StatusObserver, SubscriptionId};
