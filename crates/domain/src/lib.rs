//! # Jiffy Domain
//!
//! Business domain types and models for the Jiffy desktop agent.
//!
//! This crate contains:
//! - Activity events, sessions, snapshots and monitoring state
//! - Domain error types and Result definitions
//! - Configuration structures
//! - Wire constants shared with the telemetry endpoint
//!
//! ## Architecture
//! - No dependencies on other Jiffy crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
