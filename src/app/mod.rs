//! Application core: orchestration with zero direct I/O.
//!
//! This module wires the batch buffer, the dispatcher, the CAN router and the
//! sensor handler into one explicit application context. All interaction
//! with the publish queue, the bus, and the clock happens through **port
//! traits** defined in [`ports`], keeping this layer testable without
//! hardware.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
