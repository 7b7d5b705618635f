//! # Jiffy API
//!
//! Application layer - runtime, commands and main entry point.
//!
//! This crate contains:
//! - The agent runtime (session loop and presentation boundary)
//! - Presentation commands
//! - Application context (dependency injection)
//! - Main entry point and setup
//!
//! ## Architecture
//! - Depends on `domain`, `core`, and `infra`
//! - Wires up the hexagonal architecture

pub mod commands;
pub mod context;
pub mod runtime;
pub mod utils;

// Re-export for convenience
pub use commands::*;
pub use context::*;
pub use runtime::{AgentRuntime, RuntimeConfig};
