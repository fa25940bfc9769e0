//! Application core: connection orchestration, zero I/O.
//!
//! All interaction with the BLE stack happens through the **port traits**
//! defined in [`ports`], keeping this layer testable without a radio.

pub mod events;
pub mod ports;
pub mod service;
