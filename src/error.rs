//! Unified error types for the telemetry core.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! tick loop's error handling uniform. All variants are `Copy` so they can
//! travel through [`AppEvent`](crate::app::events::AppEvent)s and observer
//! callbacks without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the core funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Appending an entry would push the batch past its byte capacity.
    /// The batch is left exactly as it was before the call.
    Overflow {
        /// Bytes the rejected entry would have added (separator included).
        needed: usize,
        /// Bytes still free in the current batch.
        remaining: usize,
    },
    /// A CAN identifier was registered twice.
    DuplicateRoute(u32),
    /// A sensor accessor failed during a dispatch tick.
    SensorFault(SensorError),
    /// The bus transport did not respond to a read or send.
    TransportUnavailable,
    /// The publish channel refused to accept a payload.
    PublishRejected,
    /// A batch could not be serialized.
    Encode,
    /// Hardware bring-up failed.
    Init(&'static str),
    /// Configuration is invalid or a configuration-time capacity is exhausted.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overflow { needed, remaining } => {
                write!(f, "batch overflow: need {needed} bytes, {remaining} free")
            }
            Self::DuplicateRoute(id) => write!(f, "duplicate CAN route for id 0x{id:X}"),
            Self::SensorFault(e) => write!(f, "sensor: {e}"),
            Self::TransportUnavailable => write!(f, "transport unavailable"),
            Self::PublishRejected => write!(f, "publish rejected by channel"),
            Self::Encode => write!(f, "batch encoding failed"),
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// `begin()` has not completed or the first reading is still pending.
    NotReady,
    /// Navigation receiver has no position fix yet.
    NoFix,
    /// Thermocouple probe is disconnected.
    OpenCircuit,
    /// Reading is outside the physically plausible range.
    OutOfRange,
    /// Sensor is mutably borrowed elsewhere in this tick.
    Busy,
    /// Underlying device did not respond.
    Unavailable,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotReady => write!(f, "sensor not ready"),
            Self::NoFix => write!(f, "no navigation fix"),
            Self::OpenCircuit => write!(f, "probe open circuit"),
            Self::OutOfRange => write!(f, "reading out of range"),
            Self::Busy => write!(f, "sensor busy"),
            Self::Unavailable => write!(f, "device not responding"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::SensorFault(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
