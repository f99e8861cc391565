//! Thermocouple sensor.
//!
//! Reads the probe and cold-junction temperatures once per tick and caches
//! them, so dispatcher slots never touch the bus.

use super::{HandleStats, Handleable, Sensor};
use crate::app::ports::ThermocouplePort;
use crate::error::{Error, Result, SensorError};

pub struct ThermoSensor<T> {
    device: T,
    name: &'static str,
    probe: core::result::Result<f32, SensorError>,
    internal: core::result::Result<f32, SensorError>,
    stats: HandleStats,
}

impl<T: ThermocouplePort> ThermoSensor<T> {
    pub fn new(device: T, name: &'static str) -> Self {
        Self {
            device,
            name,
            probe: Err(SensorError::NotReady),
            internal: Err(SensorError::NotReady),
            stats: HandleStats::default(),
        }
    }

    /// Probe temperature (°C) from the last `handle()`.
    pub fn probe_celsius(&self) -> core::result::Result<f64, SensorError> {
        self.probe.map(f64::from)
    }

    /// Amplifier die temperature (°C) from the last `handle()`.
    pub fn internal_celsius(&self) -> core::result::Result<f64, SensorError> {
        self.internal.map(f64::from)
    }

    pub fn device_mut(&mut self) -> &mut T {
        &mut self.device
    }
}

impl<T: ThermocouplePort> Handleable for ThermoSensor<T> {
    fn begin(&mut self) -> Result<()> {
        self.device
            .begin()
            .map_err(|_| Error::Init("thermocouple amplifier did not respond"))
    }

    fn handle(&mut self) {
        self.probe = self.device.probe_celsius();
        self.internal = self.device.internal_celsius();
    }
}

impl<T: ThermocouplePort> Sensor for ThermoSensor<T> {
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
