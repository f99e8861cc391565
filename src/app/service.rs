//! Application service: the explicit telemetry context.
//!
//! [`TelemetryApp`] owns the batch buffer, the dispatcher and the CAN
//! router, and borrows the sensors (owned by the caller). One call to
//! [`TelemetryApp::tick`] is one pass of the scheduling loop:
//!
//! ```text
//!  1. sensors.handle()          (benchmarked if configured)
//!  2. clock sync from GNSS      (only while the wall clock is invalid)
//!  3. dispatcher.run()          (only while logging and clock valid)
//!  4. router.handle()           (drain + route CAN frames)
//!  5. buffer.tick()             (publish channel flush/retry)
//!  6. publish / reset_data      (every publish interval)
//!  7. diagnostics report        (every diagnostics interval)
//! ```
//!
//! Later stages rely on earlier ones: slot accessors read the state the
//! sensors refreshed in step 1 of the same tick.

use core::cell::RefCell;

use log::{debug, info, warn};

use crate::can::{CanMessage, CanRouter};
use crate::config::TelemetryConfig;
use crate::diagnostics::DiagnosticsReport;
use crate::dispatcher::Dispatcher;
use crate::error::{Error, Result};
use crate::event_buffer::EventBuffer;
use crate::sensors::SensorHandler;
use crate::status::{StatusIndicators, StatusInputs};

use super::commands::AppCommand;
use super::events::AppEvent;
use super::ports::{CanTransport, EventSink, PublishChannel, TimePort, TimeSource};

/// Sensors one app can drive.
pub const MAX_SENSORS: usize = 8;

// ───────────────────────────────────────────────────────────────
// TelemetryApp
// ───────────────────────────────────────────────────────────────

pub struct TelemetryApp<'a, P, T> {
    config: TelemetryConfig,
    buffer: EventBuffer<P>,
    dispatcher: Dispatcher<'a>,
    router: CanRouter<'a, T>,
    sensors: SensorHandler<'a, MAX_SENSORS>,
    time_source: Option<&'a RefCell<dyn TimeSource + 'a>>,

    logging_enabled: bool,
    publish_enabled: bool,
    /// Raised by any fault, cleared by the next accepted publish.
    error: bool,
    fault_count: u32,
    tick_count: u64,
}

impl<'a, P: PublishChannel, T: CanTransport> TelemetryApp<'a, P, T> {
    /// Assemble the context from configured parts. Routes and slots must
    /// already be registered.
    pub fn new(
        config: TelemetryConfig,
        buffer: EventBuffer<P>,
        dispatcher: Dispatcher<'a>,
        router: CanRouter<'a, T>,
        sensors: SensorHandler<'a, MAX_SENSORS>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            logging_enabled: config.logging_enabled_at_boot,
            publish_enabled: config.publish_enabled,
            config,
            buffer,
            dispatcher,
            router,
            sensors,
            time_source: None,
            error: false,
            fault_count: 0,
            tick_count: 0,
        })
    }

    /// Device used to set the wall clock while it is invalid.
    pub fn with_time_source(mut self, source: &'a RefCell<dyn TimeSource + 'a>) -> Self {
        self.time_source = Some(source);
        self
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Bring up sensors and the bus. Any failure is fatal.
    pub fn begin(&mut self, sink: &mut impl EventSink) -> Result<()> {
        self.sensors.begin()?;
        self.router.begin(self.config.can_bitrate)?;

        sink.emit(&AppEvent::Started {
            sensors: self.sensors.len(),
            slots: self.dispatcher.len(),
            routes: self.router.route_count(),
        });
        info!("---- TELEMETRY ONLINE - {} ----", self.config.vehicle_name);
        Ok(())
    }

    // ── Per-tick orchestration ────────────────────────────────

    pub fn tick(&mut self, clock: &mut impl TimePort, sink: &mut impl EventSink) {
        self.tick_count += 1;

        // 1. Sensors
        if self.config.benchmark_handles {
            self.sensors.benchmarked_handle(&*clock);
        } else {
            self.sensors.handle();
        }

        // 2. Wall clock
        if clock.unix_time().is_none() {
            self.sync_clock(clock, sink);
        }

        // 3. Sampling
        if self.logging_enabled && clock.unix_time().is_some() {
            let mut tap = FaultTap::new(sink);
            self.dispatcher.run(&mut self.buffer, &mut tap);
            let faults = tap.faults;
            if faults > 0 {
                self.error = true;
                self.fault_count += faults;
            }
        }

        // 4. Bus
        if let Err(e) = self.router.handle() {
            self.fault("can", e, sink);
        }

        // 5. Publish channel
        self.buffer.tick();

        // 6. Rotation
        if self.tick_count % self.config.publish_interval_ticks() == 0 {
            let now = clock.unix_time().unwrap_or(self.buffer.batch().time());
            self.rotate(now, sink);
        }

        // 7. Diagnostics
        if let Some(every) = self.config.diagnostics_interval_ticks() {
            if self.tick_count % every == 0 {
                info!("DIAG | {}", self.diagnostics());
            }
        }
    }

    /// Interpret an external command.
    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        clock: &impl TimePort,
        sink: &mut impl EventSink,
    ) {
        match cmd {
            AppCommand::EnableLogging => self.set_logging(true, sink),
            AppCommand::DisableLogging => self.set_logging(false, sink),
            AppCommand::ToggleLogging => self.set_logging(!self.logging_enabled, sink),
            AppCommand::SetPublishEnabled(enabled) => {
                self.publish_enabled = enabled;
                info!(
                    "#### Publishing has been {}",
                    if enabled { "ENABLED" } else { "DISABLED" }
                );
                sink.emit(&AppEvent::PublishingChanged(enabled));
            }
            AppCommand::PublishNow => {
                let now = clock.unix_time().unwrap_or(self.buffer.batch().time());
                self.rotate(now, sink);
            }
        }
    }

    /// Hand one frame to the bus (e.g. a speed broadcast).
    pub fn send_frame(&mut self, frame: &CanMessage, sink: &mut impl EventSink) -> Result<()> {
        let result = self.router.send(frame);
        if let Err(e) = result {
            self.fault("can", e, sink);
        }
        result
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn status(&self, clock: &impl TimePort) -> StatusIndicators {
        StatusIndicators::evaluate(StatusInputs {
            time_valid: clock.unix_time().is_some(),
            logging_enabled: self.logging_enabled,
            error: self.error,
        })
    }

    pub fn diagnostics(&self) -> DiagnosticsReport {
        DiagnosticsReport::collect(
            self.tick_count,
            self.fault_count,
            &self.sensors,
            &self.buffer,
            &self.router,
        )
    }

    pub fn logging_enabled(&self) -> bool {
        self.logging_enabled
    }

    pub fn publish_enabled(&self) -> bool {
        self.publish_enabled
    }

    pub fn has_error(&self) -> bool {
        self.error
    }

    pub fn fault_count(&self) -> u32 {
        self.fault_count
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    pub fn buffer(&self) -> &EventBuffer<P> {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut EventBuffer<P> {
        &mut self.buffer
    }

    pub fn dispatcher(&self) -> &Dispatcher<'a> {
        &self.dispatcher
    }

    pub fn router(&self) -> &CanRouter<'a, T> {
        &self.router
    }

    pub fn router_mut(&mut self) -> &mut CanRouter<'a, T> {
        &mut self.router
    }

    // ── Internals ─────────────────────────────────────────────

    fn sync_clock(&mut self, clock: &mut impl TimePort, sink: &mut impl EventSink) {
        let Some(source) = self.time_source else {
            return;
        };
        let Some(secs) = source.try_borrow().ok().and_then(|s| s.unix_time()) else {
            return;
        };
        clock.set_unix_time(secs);
        info!("Clock set from time source: {}", secs);
        sink.emit(&AppEvent::ClockSynced(secs));

        // A batch opened before the clock was valid carries a bogus stamp.
        match self.buffer.restamp_if_empty(secs) {
            Ok(true) => debug!("Empty batch restamped to {}", secs),
            Ok(false) => {}
            Err(e) => self.fault("buffer", e, sink),
        }
    }

    fn set_logging(&mut self, enabled: bool, sink: &mut impl EventSink) {
        self.logging_enabled = enabled;
        info!(
            "#### Logging has been {}",
            if enabled { "ENABLED" } else { "DISABLED" }
        );
        sink.emit(&AppEvent::LoggingChanged(enabled));
    }

    /// Close the current batch: publish it, or discard it while publishing
    /// is disabled. Empty batches are left open.
    fn rotate(&mut self, now: u64, sink: &mut impl EventSink) {
        let entries = self.buffer.batch().len();
        let bytes = self.buffer.batch().bytes();
        if entries == 0 {
            debug!("Rotation skipped: batch empty");
            return;
        }

        if !self.publish_enabled {
            match self.buffer.reset_data(now) {
                Ok(_) => sink.emit(&AppEvent::Discarded { entries, bytes }),
                Err(e) => self.fault("buffer", e, sink),
            }
            return;
        }

        match self.buffer.publish(&self.config.publish_event, now) {
            Ok(payload) => {
                self.error = false;
                debug!("{}", payload);
                sink.emit(&AppEvent::Published {
                    entries,
                    bytes,
                    accepted: true,
                    pending: self.buffer.pending_count(),
                });
            }
            Err(Error::PublishRejected) => {
                sink.emit(&AppEvent::Published {
                    entries,
                    bytes,
                    accepted: false,
                    pending: self.buffer.pending_count(),
                });
                self.fault("publish", Error::PublishRejected, sink);
            }
            Err(e) => self.fault("publish", e, sink),
        }
    }

    fn fault(&mut self, source: &'static str, error: Error, sink: &mut impl EventSink) {
        warn!("Fault in {}: {}", source, error);
        self.error = true;
        self.fault_count += 1;
        sink.emit(&AppEvent::Fault { source, error });
    }
}

/// Forwards events while counting faults.
struct FaultTap<'s, S> {
    inner: &'s mut S,
    faults: u32,
}

impl<'s, S: EventSink> FaultTap<'s, S> {
    fn new(inner: &'s mut S) -> Self {
        Self { inner, faults: 0 }
    }
}

impl<S: EventSink> EventSink for FaultTap<'_, S> {
    fn emit(&mut self, event: &AppEvent) {
        if matches!(event, AppEvent::Fault { .. }) {
            self.faults += 1;
        }
        self.inner.emit(event);
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
