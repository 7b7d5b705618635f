//! Authentication boundary consumed by delivery

pub mod ports;
