//! Outbound application events.
//!
//! The [`TelemetryApp`](super::service::TelemetryApp) and the components it
//! drives emit these through the [`EventSink`](super::ports::EventSink) port.
//! Adapters on the other side decide where they go.

use crate::error::Error;

/// Structured events emitted by the telemetry core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// Setup finished; carries the configured topology.
    Started {
        sensors: usize,
        slots: usize,
        routes: usize,
    },

    /// A recoverable fault. Emitted exactly once per occurrence.
    Fault {
        /// Where it happened: a slot tag, `"can"`, or `"publish"`.
        source: &'static str,
        error: Error,
    },

    /// A batch was handed to the publish channel.
    Published {
        entries: usize,
        bytes: usize,
        accepted: bool,
        pending: usize,
    },

    /// A batch was rotated without publishing (publishing disabled).
    Discarded { entries: usize, bytes: usize },

    /// Dispatcher sampling was switched on or off.
    LoggingChanged(bool),

    /// Batch publishing was switched on or off.
    PublishingChanged(bool),

    /// The wall clock was set from a time source.
    ClockSynced(u64),
}
