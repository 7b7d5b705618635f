//! Presentation commands
//!
//! Thin wrappers over [`AgentRuntime`](crate::runtime::AgentRuntime) that add
//! structured command logging. A host UI binds these to its own transport.

pub mod monitoring;

pub use monitoring::{
    get_dispatcher_stats, get_status, request_permission, start_monitoring, stop_monitoring,
};
