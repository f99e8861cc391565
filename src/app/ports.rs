//! Port traits: the hexagonal boundary between the telemetry core and its
//! collaborators.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ TelemetryApp (core)
//! ```
//!
//! The publish queue, the CAN controller, the wall clock and the event
//! observer all live on the far side of these traits. The core consumes them
//! via generics, so nothing in here touches hardware or the network directly.
//!
//! Every port is driven from the single scheduling loop; none of them may
//! block or spawn background work.

use crate::can::CanMessage;
use crate::error::{Result, SensorError};
use crate::event_buffer::{DeliveryFlags, Value};

// ───────────────────────────────────────────────────────────────
// Publish channel (driven adapter: core → cloud)
// ───────────────────────────────────────────────────────────────

/// At-least-once publish queue.
///
/// The channel, not the core, guarantees eventual delivery and survives
/// restarts. It does no background work: [`tick`](Self::tick) must be called
/// at a bounded cadence so it can flush and retry.
pub trait PublishChannel {
    /// Size the RAM queue and point the channel at its persistence directory.
    fn configure(&mut self, ram_capacity: usize, storage_path: &str);

    /// Submit one payload. Returns `true` if the channel accepted it.
    fn publish(&mut self, name: &str, payload: &str, flags: DeliveryFlags) -> bool;

    /// Cooperative flush/retry tick.
    fn tick(&mut self);

    /// Events accepted but not yet delivered.
    fn pending_count(&self) -> usize;
}

// ───────────────────────────────────────────────────────────────
// CAN transport (driven adapter: core ↔ bus controller)
// ───────────────────────────────────────────────────────────────

/// Raw frame read/write on the shared bus.
///
/// Queuing, retransmission and arbitration belong to the implementation.
pub trait CanTransport {
    /// Bring up the controller at `bitrate` bits per second.
    fn begin(&mut self, bitrate: u32) -> Result<()>;

    /// Level-triggered readiness: `true` while at least one frame is pending.
    fn frame_available(&mut self) -> bool;

    /// Read the oldest pending frame.
    fn read_frame(&mut self) -> Result<CanMessage>;

    /// Queue one frame for transmission. Returns `true` if the controller took it.
    fn send_frame(&mut self, frame: &CanMessage) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Time
// ───────────────────────────────────────────────────────────────

/// Monotonic and wall-clock time for the scheduling loop.
pub trait TimePort {
    /// Microseconds since boot (monotonic).
    fn uptime_us(&self) -> u64;

    /// Seconds since the Unix epoch, or `None` while the clock is not valid.
    fn unix_time(&self) -> Option<u64>;

    /// Set the wall clock (e.g. from a navigation fix).
    fn set_unix_time(&mut self, secs: u64);
}

/// A device able to supply wall-clock time, e.g. a GNSS receiver.
pub trait TimeSource {
    /// Seconds since the Unix epoch if the device currently has valid time.
    fn unix_time(&self) -> Option<u64>;
}

// ───────────────────────────────────────────────────────────────
// Sensor drivers (protocol decoding lives behind these)
// ───────────────────────────────────────────────────────────────

/// One navigation solution in receiver-native units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GnssFix {
    /// Seconds since the Unix epoch.
    pub unix_time: u64,
    /// Sub-second part of the solution time.
    pub nanos: u32,
    /// Whether the receiver vouches for `unix_time`.
    pub time_valid: bool,
    /// Degrees × 10⁷.
    pub latitude_e7: i32,
    /// Degrees × 10⁷.
    pub longitude_e7: i32,
    pub altitude_msl_mm: i32,
    pub ground_speed_mm_s: i32,
    /// Degrees × 10⁵.
    pub heading_e5: i32,
    pub horizontal_acc_mm: u32,
    pub vertical_acc_mm: u32,
    pub satellites: u8,
}

/// Satellite-navigation receiver. Polling is non-blocking.
pub trait GnssPort {
    /// Configure the receiver for `nav_rate_hz` solutions per second.
    fn begin(&mut self, nav_rate_hz: u8) -> Result<()>;

    /// Latest solution, or `None` before the first one.
    fn latest(&mut self) -> Option<GnssFix>;
}

/// Thermocouple amplifier (probe plus cold-junction reading).
pub trait ThermocouplePort {
    fn begin(&mut self) -> Result<()>;

    fn probe_celsius(&mut self) -> core::result::Result<f32, SensorError>;

    fn internal_celsius(&mut self) -> core::result::Result<f32, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Sample sink (dispatcher → batch)
// ───────────────────────────────────────────────────────────────

/// Destination for dispatched samples.
///
/// Implemented by [`EventBuffer`](crate::event_buffer::EventBuffer); tests
/// substitute recording sinks.
pub trait SampleSink {
    /// Append one sample. Fails without side effects if it does not fit.
    fn add(&mut self, tag: &str, value: Value) -> Result<()>;
}

// ───────────────────────────────────────────────────────────────
// Event sink (driven adapter: core → logging / indicators)
// ───────────────────────────────────────────────────────────────

/// The core emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port. Adapters decide where they go (serial log, indicator
/// LEDs, diagnostics counters).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}
