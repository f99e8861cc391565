//! Dispatcher cadence and fault isolation, sampling into a real `EventBuffer`.

use std::cell::RefCell;

use telemetry::adapters::sim::{SimGnss, SimThermocouple};
use telemetry::app::ports::SampleSink;
use telemetry::dispatcher::{CommandSlot, DispatcherBuilder};
use telemetry::error::{Error, SensorError};
use telemetry::event_buffer::{DeliveryFlags, EventBuffer, MIN_BATCH_CAPACITY, Value};
use telemetry::sensors::Handleable;
use telemetry::sensors::gps::GpsSensor;
use telemetry::sensors::thermo::ThermoSensor;

use super::mock_hw::{CountingSensor, LogSink, RecordingChannel};

const START: u64 = 1_700_000_000;

fn buffer(capacity: usize) -> EventBuffer<RecordingChannel> {
    EventBuffer::new(
        RecordingChannel::default(),
        capacity,
        8,
        "/tmp/queue",
        DeliveryFlags::PRIVATE_WITH_ACK,
        START,
    )
    .unwrap()
}

fn tags(buffer: &EventBuffer<RecordingChannel>) -> Vec<&str> {
    buffer
        .batch()
        .entries()
        .iter()
        .map(|e| e.tag.as_str())
        .collect()
}

#[test]
fn slots_fire_in_registration_order() {
    let sensor = RefCell::new(CountingSensor::new("probe"));
    let mut dispatcher = DispatcherBuilder::new(3)
        .add(&sensor, "c", CountingSensor::reading, 3)
        .unwrap()
        .add(&sensor, "a", CountingSensor::reading, 1)
        .unwrap()
        .add(&sensor, "b", CountingSensor::reading, 3)
        .unwrap()
        .build();
    let mut out = buffer(1024);
    let mut sink = LogSink::new();

    for _ in 0..3 {
        dispatcher.run(&mut out, &mut sink);
    }

    assert_eq!(tags(&out), ["a", "a", "c", "a", "b"]);
    assert_eq!(dispatcher.tick_count(), 3);
}

#[test]
fn faulting_slot_does_not_starve_neighbours() {
    let good = RefCell::new(CountingSensor::new("good"));
    let bad = RefCell::new(CountingSensor::new("bad"));
    bad.borrow_mut().fault = Some(SensorError::NoFix);
    let mut dispatcher = DispatcherBuilder::new(2)
        .add(&bad, "lat", CountingSensor::reading, 1)
        .unwrap()
        .add(&good, "temp", CountingSensor::celsius, 1)
        .unwrap()
        .build();
    let mut out = buffer(1024);
    let mut sink = LogSink::new();

    for _ in 0..5 {
        dispatcher.run(&mut out, &mut sink);
    }

    assert_eq!(out.batch().len(), 5);
    assert_eq!(sink.faults().len(), 5);
    assert!(
        sink.faults()
            .iter()
            .all(|&f| f == ("lat", Error::SensorFault(SensorError::NoFix)))
    );
    // Faulted reads still advance the cadence.
    assert_eq!(dispatcher.slots()[0].fire_count(), 5);
}

#[test]
fn full_batch_reports_overflow_and_keeps_contents() {
    let sensor = RefCell::new(CountingSensor::new("probe"));
    let mut dispatcher = DispatcherBuilder::new(1)
        .add(&sensor, "reading", CountingSensor::reading, 1)
        .unwrap()
        .build();
    let mut out = buffer(MIN_BATCH_CAPACITY);
    let mut sink = LogSink::new();

    let mut appended = 0;
    for _ in 0..10 {
        appended += dispatcher.run(&mut out, &mut sink);
    }

    assert_eq!(out.batch().len(), appended);
    assert!(appended < 10);
    assert!(out.batch().bytes() <= MIN_BATCH_CAPACITY);
    assert_eq!(out.finalize().unwrap().len(), out.batch().bytes());
    assert!(
        sink.faults()
            .iter()
            .all(|(source, e)| *source == "reading" && matches!(e, Error::Overflow { .. }))
    );
    assert_eq!(sink.faults().len(), 10 - appended);
}

#[test]
fn prebuilt_slot_with_precision() {
    let thermo = RefCell::new(ThermoSensor::new(SimThermocouple::new(21.0), "Thermo"));
    thermo.borrow_mut().begin().unwrap();
    thermo.borrow_mut().handle();
    let slot = CommandSlot::new(&thermo, "temp", ThermoSensor::internal_celsius, 1)
        .unwrap()
        .with_precision(1);
    let mut dispatcher = DispatcherBuilder::new(1).slot(slot).unwrap().build();
    let mut out = buffer(256);
    let mut sink = LogSink::new();

    dispatcher.run(&mut out, &mut sink);

    assert_eq!(
        out.batch().entries()[0].value,
        Value::Text("21.0".to_owned())
    );
}

#[test]
fn gps_slots_before_first_fix() {
    let gps = RefCell::new(GpsSensor::new(SimGnss::new(START, 1, 250)));
    gps.borrow_mut().begin().unwrap();
    let mut dispatcher = DispatcherBuilder::new(2)
        .add(&gps, "lat", GpsSensor::latitude, 1)
        .unwrap()
        .add(&gps, "sat", GpsSensor::satellites_in_view, 1)
        .unwrap()
        .build();
    let mut out = buffer(512);
    let mut sink = LogSink::new();

    dispatcher.run(&mut out, &mut sink);
    assert!(out.batch().is_empty());
    assert_eq!(sink.faults().len(), 2);

    gps.borrow_mut().handle();
    dispatcher.run(&mut out, &mut sink);
    assert_eq!(tags(&out), ["lat", "sat"]);
    assert_eq!(out.batch().entries()[1].value, Value::Int(11));
}

#[test]
fn custom_sink_receives_samples() {
    #[derive(Default)]
    struct Collect(Vec<(String, Value)>);

    impl SampleSink for Collect {
        fn add(&mut self, tag: &str, value: Value) -> telemetry::Result<()> {
            self.0.push((tag.to_owned(), value));
            Ok(())
        }
    }

    let sensor = RefCell::new(CountingSensor::new("probe"));
    let mut dispatcher = DispatcherBuilder::new(1)
        .add(&sensor, "n", CountingSensor::reading, 2)
        .unwrap()
        .build();
    let mut out = Collect::default();
    let mut sink = LogSink::new();

    for _ in 0..4 {
        dispatcher.run(&mut out, &mut sink);
    }

    assert_eq!(
        out.0,
        vec![("n".to_owned(), Value::Int(0)), ("n".to_owned(), Value::Int(0))]
    );
}
