//! Accessibility observation ports

pub mod ports;
