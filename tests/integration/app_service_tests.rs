//! End-to-end tick-loop tests for `TelemetryApp` against recording mocks.

use std::cell::RefCell;

use telemetry::app::commands::AppCommand;
use telemetry::app::events::AppEvent;
use telemetry::app::service::{MAX_SENSORS, TelemetryApp};
use telemetry::can::{CanRouter, FrameCache};
use telemetry::config::TelemetryConfig;
use telemetry::dispatcher::DispatcherBuilder;
use telemetry::error::{Error, SensorError};
use telemetry::event_buffer::{DeliveryFlags, EventBuffer};
use telemetry::sensors::SensorHandler;
use telemetry::status::Indicator;

use super::mock_hw::{
    CountingSensor, FixedTimeSource, LogSink, ManualClock, RecordingChannel, ScriptedBus,
};

const START: u64 = 1_700_000_000;
const ENGINE_ID: u32 = 0x0C0;

type App<'a> = TelemetryApp<'a, RecordingChannel, ScriptedBus>;

/// 50 ms ticks, rotation every 4 ticks.
fn config() -> TelemetryConfig {
    TelemetryConfig {
        tick_interval_ms: 50,
        publish_interval_ms: 200,
        ..TelemetryConfig::default()
    }
}

/// One sensor behind two slots: `temp` every tick, `n` every second tick.
fn make_app<'a>(
    config: TelemetryConfig,
    sensor: &'a RefCell<CountingSensor>,
    bus: ScriptedBus,
) -> App<'a> {
    let buffer = EventBuffer::from_config(RecordingChannel::default(), &config, START).unwrap();
    let dispatcher = DispatcherBuilder::new(2)
        .add(sensor, "temp", CountingSensor::celsius, 1)
        .unwrap()
        .add(sensor, "n", CountingSensor::reading, 2)
        .unwrap()
        .build();
    let router = CanRouter::new(bus, config.max_frames_per_tick);
    let mut sensors: SensorHandler<'a, MAX_SENSORS> = SensorHandler::new();
    sensors.add(sensor).unwrap();
    TelemetryApp::new(config, buffer, dispatcher, router, sensors).unwrap()
}

fn run(app: &mut App<'_>, clock: &mut ManualClock, sink: &mut LogSink, ticks: usize) {
    for _ in 0..ticks {
        app.tick(clock, sink);
    }
}

// ── Bring-up ──────────────────────────────────────────────────

#[test]
fn begin_reports_topology_and_starts_bus() {
    let sensor = RefCell::new(CountingSensor::new("probe"));
    let mut app = make_app(config(), &sensor, ScriptedBus::default());
    let mut sink = LogSink::new();

    app.begin(&mut sink).unwrap();

    assert_eq!(app.router().transport().bitrate, Some(500_000));
    assert_eq!(
        sink.events,
        vec![AppEvent::Started {
            sensors: 1,
            slots: 2,
            routes: 0,
        }]
    );
}

#[test]
fn begin_fails_on_sensor_failure() {
    let sensor = RefCell::new(CountingSensor::new("probe"));
    sensor.borrow_mut().fail_begin = true;
    let mut app = make_app(config(), &sensor, ScriptedBus::default());
    let mut sink = LogSink::new();

    assert!(matches!(app.begin(&mut sink), Err(Error::Init(_))));
    assert!(sink.events.is_empty());
    assert_eq!(app.router().transport().bitrate, None);
}

#[test]
fn invalid_config_rejected() {
    let sensor = RefCell::new(CountingSensor::new("probe"));
    let good = config();
    let buffer = EventBuffer::from_config(RecordingChannel::default(), &good, START).unwrap();
    let bad = TelemetryConfig {
        publish_interval_ms: 10,
        ..good
    };
    let result = TelemetryApp::new(
        bad,
        buffer,
        DispatcherBuilder::new(0).build(),
        CanRouter::new(ScriptedBus::default(), 4),
        {
            let mut s: SensorHandler<'_, MAX_SENSORS> = SensorHandler::new();
            s.add(&sensor).unwrap();
            s
        },
    );
    assert!(matches!(result, Err(Error::Config(_))));
}

// ── Sampling and rotation ─────────────────────────────────────

#[test]
fn batch_published_every_interval() {
    let sensor = RefCell::new(CountingSensor::new("probe"));
    let mut app = make_app(config(), &sensor, ScriptedBus::default());
    let mut clock = ManualClock::valid(START);
    let mut sink = LogSink::new();

    run(&mut app, &mut clock, &mut sink, 3);
    assert!(app.buffer().channel().submitted.is_empty());
    assert_eq!(app.buffer().batch().len(), 4);

    app.tick(&mut clock, &mut sink);

    let channel = app.buffer().channel();
    assert_eq!(channel.submitted.len(), 1);
    assert_eq!(channel.submitted[0].name, "telemetry");
    assert_eq!(channel.submitted[0].flags, DeliveryFlags::PRIVATE_WITH_ACK);

    let payload: serde_json::Value = serde_json::from_str(&channel.submitted[0].payload).unwrap();
    assert_eq!(payload["time"], START);
    let entries = payload["d"].as_array().unwrap();
    let tags: Vec<_> = entries.iter().map(|e| e["t"].as_str().unwrap()).collect();
    assert_eq!(tags, ["temp", "temp", "n", "temp", "temp", "n"]);
    assert_eq!(entries[0]["d"], 20.25);
    assert_eq!(entries[2]["d"], 2);
    assert_eq!(entries[5]["d"], 4);

    assert!(app.buffer().batch().is_empty());
    assert_eq!(sink.published(), 1);
    assert!(!app.has_error());
}

#[test]
fn sampling_waits_for_valid_clock() {
    let sensor = RefCell::new(CountingSensor::new("probe"));
    let source = RefCell::new(FixedTimeSource::default());
    let mut app = make_app(config(), &sensor, ScriptedBus::default()).with_time_source(&source);
    let mut clock = ManualClock::default();
    let mut sink = LogSink::new();

    run(&mut app, &mut clock, &mut sink, 2);
    assert!(app.buffer().batch().is_empty());
    assert_eq!(sensor.borrow().handled, 2);
    assert_eq!(app.status(&clock).clock, Indicator::Flash);

    source.borrow_mut().secs = Some(START + 60);
    app.tick(&mut clock, &mut sink);

    assert_eq!(clock.unix, Some(START + 60));
    assert!(sink.events.contains(&AppEvent::ClockSynced(START + 60)));
    assert_eq!(app.buffer().batch().time(), START + 60);
    assert_eq!(app.buffer().batch().len(), 1);
    assert_eq!(app.status(&clock).clock, Indicator::On);
}

#[test]
fn disabled_logging_keeps_batch_and_skips_empty_rotation() {
    let sensor = RefCell::new(CountingSensor::new("probe"));
    let mut app = make_app(config(), &sensor, ScriptedBus::default());
    let mut clock = ManualClock::valid(START);
    let mut sink = LogSink::new();

    app.tick(&mut clock, &mut sink);
    app.handle_command(AppCommand::DisableLogging, &clock, &mut sink);
    run(&mut app, &mut clock, &mut sink, 2);
    assert_eq!(app.buffer().batch().len(), 1);

    // Rotation at tick 4 still publishes what was sampled before.
    app.tick(&mut clock, &mut sink);
    assert_eq!(app.buffer().channel().submitted.len(), 1);

    // Nothing sampled since, so the next rotation is skipped.
    run(&mut app, &mut clock, &mut sink, 4);
    assert_eq!(app.buffer().channel().submitted.len(), 1);
    assert!(sink.events.contains(&AppEvent::LoggingChanged(false)));
    assert_eq!(app.status(&clock).logging, Indicator::Off);
}

#[test]
fn disabled_publishing_discards_batches() {
    let sensor = RefCell::new(CountingSensor::new("probe"));
    let mut app = make_app(config(), &sensor, ScriptedBus::default());
    let mut clock = ManualClock::valid(START);
    let mut sink = LogSink::new();

    app.handle_command(AppCommand::SetPublishEnabled(false), &clock, &mut sink);
    run(&mut app, &mut clock, &mut sink, 4);

    assert!(app.buffer().channel().submitted.is_empty());
    assert!(app.buffer().batch().is_empty());
    assert!(sink.events.iter().any(|e| matches!(
        e,
        AppEvent::Discarded { entries: 6, .. }
    )));
    assert_eq!(sink.published(), 0);
}

#[test]
fn publish_now_rotates_mid_interval() {
    let sensor = RefCell::new(CountingSensor::new("probe"));
    let mut app = make_app(config(), &sensor, ScriptedBus::default());
    let mut clock = ManualClock::valid(START);
    let mut sink = LogSink::new();

    app.tick(&mut clock, &mut sink);
    clock.unix = Some(START + 5);
    app.handle_command(AppCommand::PublishNow, &clock, &mut sink);

    assert_eq!(app.buffer().channel().submitted.len(), 1);
    assert_eq!(app.buffer().batch().time(), START + 5);
}

// ── Faults and the error flag ─────────────────────────────────

#[test]
fn rejected_publish_sets_error_until_next_accepted() {
    let sensor = RefCell::new(CountingSensor::new("probe"));
    let mut app = make_app(config(), &sensor, ScriptedBus::default());
    let mut clock = ManualClock::valid(START);
    let mut sink = LogSink::new();

    app.buffer_mut().channel_mut().reject = true;
    run(&mut app, &mut clock, &mut sink, 4);

    assert!(app.has_error());
    assert_eq!(sink.faults(), vec![("publish", Error::PublishRejected)]);
    assert!(app.buffer().batch().is_empty());
    assert_eq!(app.status(&clock).fault, Indicator::Flash);

    app.buffer_mut().channel_mut().reject = false;
    run(&mut app, &mut clock, &mut sink, 4);

    assert!(!app.has_error());
    assert_eq!(app.fault_count(), 1);
    assert_eq!(app.status(&clock).fault, Indicator::Off);
}

#[test]
fn sensor_fault_reported_per_slot() {
    let sensor = RefCell::new(CountingSensor::new("probe"));
    let mut app = make_app(config(), &sensor, ScriptedBus::default());
    let mut clock = ManualClock::valid(START);
    let mut sink = LogSink::new();

    sensor.borrow_mut().fault = Some(SensorError::OpenCircuit);
    run(&mut app, &mut clock, &mut sink, 2);

    let open = Error::SensorFault(SensorError::OpenCircuit);
    assert_eq!(
        sink.faults(),
        vec![("temp", open), ("temp", open), ("n", open)]
    );
    assert_eq!(app.fault_count(), 3);
    assert!(app.has_error());
    assert_eq!(app.status(&clock).logging, Indicator::Flash);

    sensor.borrow_mut().fault = None;
    app.tick(&mut clock, &mut sink);
    assert_eq!(app.buffer().batch().len(), 1);
}

// ── CAN ───────────────────────────────────────────────────────

#[test]
fn frames_routed_during_tick() {
    let sensor = RefCell::new(CountingSensor::new("probe"));
    let cache = RefCell::new(FrameCache::new());
    let bus = ScriptedBus::with_frames(&[(ENGINE_ID, &[0x07, 0xD0]), (0x7FF, &[])]);
    let mut app = make_app(config(), &sensor, bus);
    app.router_mut()
        .add_route(ENGINE_ID, FrameCache::recorder(&cache))
        .unwrap();
    let mut clock = ManualClock::valid(START);
    let mut sink = LogSink::new();

    app.tick(&mut clock, &mut sink);

    assert_eq!(cache.borrow().read_be(ENGINE_ID, 0, 2), Ok(2_000));
    let stats = app.router().stats();
    assert_eq!((stats.received, stats.routed, stats.dropped), (2, 1, 1));
    assert!(sink.faults().is_empty());
}

#[test]
fn bus_read_failure_is_a_fault() {
    let sensor = RefCell::new(CountingSensor::new("probe"));
    let mut bus = ScriptedBus::with_frames(&[(ENGINE_ID, &[1])]);
    bus.fail_reads = true;
    let mut app = make_app(config(), &sensor, bus);
    let mut clock = ManualClock::valid(START);
    let mut sink = LogSink::new();

    app.tick(&mut clock, &mut sink);

    assert_eq!(sink.faults(), vec![("can", Error::TransportUnavailable)]);
    assert!(app.has_error());
    // Sampling in the same tick was unaffected.
    assert_eq!(app.buffer().batch().len(), 1);
}

#[test]
fn send_frame_reaches_transport() {
    let sensor = RefCell::new(CountingSensor::new("probe"));
    let mut app = make_app(config(), &sensor, ScriptedBus::default());
    let mut sink = LogSink::new();

    let frame = telemetry::can::CanMessage::new(0x3E8, &[0x03, 0xE8]);
    app.send_frame(&frame, &mut sink).unwrap();

    assert_eq!(app.router().transport().sent, vec![frame]);
    assert!(!app.has_error());
}

// ── Diagnostics ───────────────────────────────────────────────

#[test]
fn benchmarked_ticks_show_in_diagnostics() {
    let sensor = RefCell::new(CountingSensor::new("probe"));
    let config = TelemetryConfig {
        benchmark_handles: true,
        ..config()
    };
    let mut app = make_app(config, &sensor, ScriptedBus::default());
    let mut clock = ManualClock::valid(START);
    let mut sink = LogSink::new();

    run(&mut app, &mut clock, &mut sink, 3);
    let report = app.diagnostics();

    assert_eq!(report.tick, 3);
    assert_eq!(report.batch_entries, 4);
    assert_eq!(report.sensors.len(), 1);
    assert_eq!(report.sensors[0].name, "probe");
    assert_eq!(report.sensors[0].benchmarked_calls, 3);
}
