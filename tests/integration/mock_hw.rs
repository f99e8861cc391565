//! Mock collaborators for integration tests.
//!
//! Every mock records what the core asked of it so tests can assert on the
//! full call history without a bus controller or a cloud link.

use std::cell::Cell;
use std::collections::VecDeque;

use telemetry::app::events::AppEvent;
use telemetry::app::ports::{CanTransport, EventSink, PublishChannel, TimePort, TimeSource};
use telemetry::can::CanMessage;
use telemetry::error::{Error, Result, SensorError};
use telemetry::event_buffer::DeliveryFlags;
use telemetry::sensors::{HandleStats, Handleable, Sensor};

// ── Publish channel ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Submitted {
    pub name: String,
    pub payload: String,
    pub flags: DeliveryFlags,
}

#[derive(Default)]
pub struct RecordingChannel {
    pub configured: Option<(usize, String)>,
    pub submitted: Vec<Submitted>,
    pub ticks: usize,
    pub reject: bool,
}

impl PublishChannel for RecordingChannel {
    fn configure(&mut self, ram_capacity: usize, storage_path: &str) {
        self.configured = Some((ram_capacity, storage_path.to_owned()));
    }

    fn publish(&mut self, name: &str, payload: &str, flags: DeliveryFlags) -> bool {
        self.submitted.push(Submitted {
            name: name.to_owned(),
            payload: payload.to_owned(),
            flags,
        });
        !self.reject
    }

    fn tick(&mut self) {
        self.ticks += 1;
    }

    fn pending_count(&self) -> usize {
        0
    }
}

// ── CAN transport ─────────────────────────────────────────────

#[derive(Default)]
pub struct ScriptedBus {
    pub bitrate: Option<u32>,
    pub rx: VecDeque<CanMessage>,
    pub sent: Vec<CanMessage>,
    pub fail_reads: bool,
    pub fail_begin: bool,
    pub availability_checks: usize,
}

#[allow(dead_code)]
impl ScriptedBus {
    pub fn with_frames(frames: &[(u32, &[u8])]) -> Self {
        Self {
            rx: frames
                .iter()
                .map(|&(id, data)| CanMessage::new(id, data))
                .collect(),
            ..Self::default()
        }
    }

    pub fn push(&mut self, id: u32, data: &[u8]) {
        self.rx.push_back(CanMessage::new(id, data));
    }
}

impl CanTransport for ScriptedBus {
    fn begin(&mut self, bitrate: u32) -> Result<()> {
        if self.fail_begin {
            return Err(Error::Init("controller did not respond"));
        }
        self.bitrate = Some(bitrate);
        Ok(())
    }

    fn frame_available(&mut self) -> bool {
        self.availability_checks += 1;
        !self.rx.is_empty()
    }

    fn read_frame(&mut self) -> Result<CanMessage> {
        if self.fail_reads {
            return Err(Error::TransportUnavailable);
        }
        self.rx.pop_front().ok_or(Error::TransportUnavailable)
    }

    fn send_frame(&mut self, frame: &CanMessage) -> bool {
        self.sent.push(*frame);
        true
    }
}

// ── Clock ─────────────────────────────────────────────────────

#[derive(Default)]
pub struct ManualClock {
    pub uptime_us: Cell<u64>,
    pub unix: Option<u64>,
}

#[allow(dead_code)]
impl ManualClock {
    pub fn valid(secs: u64) -> Self {
        Self {
            uptime_us: Cell::new(0),
            unix: Some(secs),
        }
    }
}

impl TimePort for ManualClock {
    fn uptime_us(&self) -> u64 {
        self.uptime_us.get()
    }

    fn unix_time(&self) -> Option<u64> {
        self.unix
    }

    fn set_unix_time(&mut self, secs: u64) {
        self.unix = Some(secs);
    }
}

/// Receiver stand-in that knows the time once `secs` is set.
#[derive(Default)]
pub struct FixedTimeSource {
    pub secs: Option<u64>,
}

impl TimeSource for FixedTimeSource {
    fn unix_time(&self) -> Option<u64> {
        self.secs
    }
}

// ── Sensor ────────────────────────────────────────────────────

/// Sensor whose reading advances by one on every `handle()`.
pub struct CountingSensor {
    pub name: &'static str,
    pub handled: u32,
    pub fault: Option<SensorError>,
    pub fail_begin: bool,
    stats: HandleStats,
}

#[allow(dead_code)]
impl CountingSensor {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            handled: 0,
            fault: None,
            fail_begin: false,
            stats: HandleStats::default(),
        }
    }

    pub fn reading(&self) -> core::result::Result<u32, SensorError> {
        match self.fault {
            Some(e) => Err(e),
            None => Ok(self.handled),
        }
    }

    pub fn celsius(&self) -> core::result::Result<f64, SensorError> {
        self.reading().map(|n| 20.0 + f64::from(n) / 4.0)
    }
}

impl Handleable for CountingSensor {
    fn begin(&mut self) -> Result<()> {
        if self.fail_begin {
            return Err(Error::Init("sensor did not respond"));
        }
        Ok(())
    }

    fn handle(&mut self) {
        self.handled += 1;
    }
}

impl Sensor for CountingSensor {
    fn human_name(&self) -> &'static str {
        self.name
    }

    fn handle_stats(&self) -> &HandleStats {
        &self.stats
    }

    fn handle_stats_mut(&mut self) -> &mut HandleStats {
        &mut self.stats
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct LogSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn faults(&self) -> Vec<(&'static str, Error)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::Fault { source, error } => Some((*source, *error)),
                _ => None,
            })
            .collect()
    }

    pub fn published(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, AppEvent::Published { .. }))
            .count()
    }
}

impl EventSink for LogSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
