//! Vehicle telemetry firmware library.
//!
//! Samples onboard sensors into timestamped JSON batches for an
//! at-least-once publish channel, and routes the shared CAN bus by frame
//! identifier. Everything hardware-facing sits behind the port traits in
//! [`app::ports`]; the [`adapters`] module carries host implementations
//! used by the simulation runner and the tests.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod can;
pub mod config;
pub mod diagnostics;
pub mod dispatcher;
pub mod error;
pub mod event_buffer;
pub mod sensors;
pub mod status;

pub use error::{Error, Result, SensorError};
