//! macOS Platform Integration
//!
//! Adapters for the observation ports using the Accessibility API and
//! NSWorkspace.
//!
//! - [`ax_helpers`] - Low-level Accessibility API bindings and the tree walk
//! - [`error_helpers`] - Error mapping utilities
//! - [`permission_gate`] - `PermissionGate` with a short-lived trust cache
//! - [`snapshot_source`] - `SnapshotSource` for the target application
//!
//! # Permission Requirements
//!
//! - **NSWorkspace**: No special permissions (bundle ID, PID, frontmost app)
//! - **Accessibility API**: Requires user approval in System Settings

pub mod ax_helpers;
pub mod error_helpers;
pub mod permission_gate;
pub mod snapshot_source;

pub use ax_helpers::ScanLimits;
pub use permission_gate::AxPermissionGate;
pub use snapshot_source::MacSnapshotSource;
