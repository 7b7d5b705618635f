//! Outbound event queue policy and sink port

pub mod ports;
pub mod queue;
