//! Vehicle telemetry host simulation runner.
//!
//! Wires the telemetry core to host adapters and runs the scheduling loop
//! in real time.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  SimGnss / SimThermocouple   MemoryPublishQueue   SystemClock  │
//! │  (GnssPort / Thermocouple)   (PublishChannel)     (TimePort)   │
//! │  LoopbackCan                 LogEventSink                      │
//! │  (CanTransport)              (EventSink)                       │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              TelemetryApp (pure logic)                 │    │
//! │  │  Sensors · Dispatcher · EventBuffer · CanRouter        │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Environment:
//! - `TELEMETRY_CONFIG`: path to a JSON [`TelemetryConfig`] (defaults otherwise)
//! - `TELEMETRY_SIM_TICKS`: number of ticks to run (default 1200)
//! - `RUST_LOG`: log filter (default `info`)
#![deny(unused_must_use)]

use std::cell::RefCell;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use log::info;
use tracing_subscriber::EnvFilter;

use telemetry::adapters::can_loopback::LoopbackCan;
use telemetry::adapters::log_sink::LogEventSink;
use telemetry::adapters::publish_queue::MemoryPublishQueue;
use telemetry::adapters::sim::{SimGnss, SimThermocouple};
use telemetry::adapters::time::SystemClock;
use telemetry::app::commands::AppCommand;
use telemetry::app::service::{MAX_SENSORS, TelemetryApp};
use telemetry::can::{CanMessage, CanRouter, FrameCache};
use telemetry::config::TelemetryConfig;
use telemetry::dispatcher::DispatcherBuilder;
use telemetry::event_buffer::EventBuffer;
use telemetry::sensors::SensorHandler;
use telemetry::sensors::gps::{GeoBox, GpsSensor};
use telemetry::sensors::thermo::ThermoSensor;

/// Engine ECU broadcast: RPM, big-endian u16 in bytes 0..2.
const ENGINE_FRAME_ID: u32 = 0x0C0;
/// Our own ground-speed broadcast: cm/s, big-endian u16.
const SPEED_FRAME_ID: u32 = 0x3E8;

const DEFAULT_SIM_TICKS: u64 = 1_200;

// ── Setup helpers ─────────────────────────────────────────────

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

fn load_config() -> Result<TelemetryConfig> {
    match std::env::var("TELEMETRY_CONFIG") {
        Ok(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config file {path}"))?;
            let config = TelemetryConfig::from_json(&json)
                .with_context(|| format!("parsing config file {path}"))?;
            info!("Config loaded from {}", path);
            Ok(config)
        }
        Err(_) => {
            info!("No TELEMETRY_CONFIG set, using defaults");
            Ok(TelemetryConfig::default())
        }
    }
}

fn sim_ticks() -> Result<u64> {
    match std::env::var("TELEMETRY_SIM_TICKS") {
        Ok(v) => v.parse().context("TELEMETRY_SIM_TICKS must be an integer"),
        Err(_) => Ok(DEFAULT_SIM_TICKS),
    }
}

fn host_unix_time() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(1_700_000_000)
}

// ── Entry point ───────────────────────────────────────────────

fn main() -> Result<()> {
    init_logging();
    let config = load_config()?;
    let ticks = sim_ticks()?;
    info!(
        "{} - tick {} ms, publish every {} ms",
        config.vehicle_name, config.tick_interval_ms, config.publish_interval_ms
    );

    // Sensors are owned here and lent to the app for its whole lifetime.
    let gps = RefCell::new(
        GpsSensor::new(SimGnss::new(host_unix_time(), 5, 250))
            .with_geobox(GeoBox::new(-123.30, -123.00, 49.20, 49.40))?,
    );
    let thermo = RefCell::new(ThermoSensor::new(SimThermocouple::new(22.0), "Thermo"));
    let bus = RefCell::new(FrameCache::new());

    let mut sensors: SensorHandler<'_, MAX_SENSORS> = SensorHandler::new();
    sensors.add(&gps)?;
    sensors.add(&thermo)?;

    let dispatcher = DispatcherBuilder::new(12)
        .add(&gps, "lat", GpsSensor::latitude, 20)?
        .with_precision(6)
        .add(&gps, "lon", GpsSensor::longitude, 20)?
        .with_precision(6)
        .add(&gps, "hdg", GpsSensor::heading, 20)?
        .add(&gps, "spd", GpsSensor::horizontal_speed, 20)?
        .with_precision(2)
        .add(&gps, "hacc", GpsSensor::horizontal_acceleration, 20)?
        .with_precision(2)
        .add(&gps, "alt", GpsSensor::altitude, 20)?
        .with_precision(2)
        .add(&gps, "vspd", GpsSensor::vertical_speed, 20)?
        .with_precision(2)
        .add(&gps, "vacc", GpsSensor::vertical_acceleration, 20)?
        .with_precision(2)
        .add(&gps, "sat", GpsSensor::satellites_in_view, 100)?
        .add(&thermo, "temp", ThermoSensor::probe_celsius, 20)?
        .with_precision(2)
        .add(
            &bus,
            "rpm",
            |c: &FrameCache| c.read_be(ENGINE_FRAME_ID, 0, 2),
            20,
        )?
        .build();

    let mut router = CanRouter::new(LoopbackCan::new().with_echo(), config.max_frames_per_tick);
    router.add_route(ENGINE_FRAME_ID, FrameCache::recorder(&bus))?;
    router.add_route(SPEED_FRAME_ID, FrameCache::recorder(&bus))?;

    let mut clock = SystemClock::new();
    let buffer = EventBuffer::from_config(MemoryPublishQueue::new(), &config, 0)?;

    let mut app = TelemetryApp::new(config.clone(), buffer, dispatcher, router, sensors)?
        .with_time_source(&gps);
    let mut sink = LogEventSink::new();
    app.begin(&mut sink).context("bring-up failed")?;

    // ── Scheduling loop ───────────────────────────────────────
    let period = Duration::from_millis(config.tick_interval_ms.into());
    let mut last_status = app.status(&clock);

    for n in 1..=ticks {
        let started = Instant::now();

        // Simulated engine ECU, 2 Hz.
        if n % 10 == 0 {
            let rpm = 2_000 + (n % 40) as u16 * 25;
            app.router_mut()
                .transport_mut()
                .inject(CanMessage::new(ENGINE_FRAME_ID, &rpm.to_be_bytes()));
        }

        app.tick(&mut clock, &mut sink);

        // Speed broadcast on every new navigation solution.
        let speed = gps.borrow_mut().take_speed_update();
        if let Some(mps) = speed {
            let cms = (mps * 100.0).clamp(0.0, f64::from(u16::MAX)) as u16;
            // A failed send is already reported as a fault.
            let _ = app.send_frame(&CanMessage::new(SPEED_FRAME_ID, &cms.to_be_bytes()), &mut sink);
        }

        let status = app.status(&clock);
        if status != last_status {
            info!(
                "UI | clock={:?} logging={:?} fault={:?}",
                status.clock, status.logging, status.fault
            );
            last_status = status;
        }

        if let Some(rest) = period.checked_sub(started.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    // ── Shutdown: flush what is left ──────────────────────────
    app.handle_command(AppCommand::PublishNow, &clock, &mut sink);
    for _ in 0..config.ram_queue_events {
        if app.buffer().pending_count() == 0 {
            break;
        }
        app.buffer_mut().tick();
    }
    info!("Final | {}", app.diagnostics());
    info!(
        "Delivered {} batches, {} faults",
        app.buffer().channel().delivered(),
        sink.faults()
    );
    Ok(())
}
