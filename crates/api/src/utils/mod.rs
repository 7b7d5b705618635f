//! Shared helpers for the command layer and the binary

pub mod logging;
