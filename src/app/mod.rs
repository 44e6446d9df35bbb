//! Application core — pure domain logic, zero I/O.
//!
//! This module holds the orchestration of the care engine: the service
//! that drives the FSM, the commands it accepts and the events it emits.
//! All interaction with the device, contacts and storage happens through
//! **port traits** defined in [`ports`], keeping this layer fully testable
//! without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
