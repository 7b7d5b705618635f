//! Domain types
//!
//! Events, sessions, snapshots and the monitoring state shared between the
//! observation, classification, session and delivery layers.

pub mod event;
pub mod identity;
pub mod monitoring;
pub mod session;
pub mod snapshot;
pub mod status;

pub use event::{ActivityEvent, EventType, PayloadHint};
pub use identity::Identity;
pub use monitoring::MonitoringState;
pub use session::{Session, SessionSnapshot, SessionState};
pub use snapshot::{ConversationTurn, Snapshot, TurnRole, WindowMeta};
pub use status::AgentStatus;
