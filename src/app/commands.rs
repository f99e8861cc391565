//! Inbound commands to the application context.
//!
//! These represent actions requested by the outside world (cloud functions,
//! a push button, a diagnostics console) that the
//! [`TelemetryApp`](super::service::TelemetryApp) interprets.

/// Commands that external adapters can send into the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCommand {
    /// Start dispatcher sampling.
    EnableLogging,

    /// Stop dispatcher sampling; the current batch is kept.
    DisableLogging,

    /// Flip the logging state (push button).
    ToggleLogging,

    /// Choose between publishing and discarding at each rotation.
    SetPublishEnabled(bool),

    /// Rotate the current batch now instead of waiting for the interval.
    PublishNow,
}
