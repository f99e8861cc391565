//! Simulated sensor collaborators for host runs.
//!
//! [`SimGnss`] produces a receiver that needs a few solutions before it
//! trusts its own clock, then drives north while speed and altitude wander.
//! [`SimThermocouple`] ramps a probe temperature and can be forced into an
//! open-circuit fault.

use log::info;

use crate::app::ports::{GnssFix, GnssPort, ThermocouplePort};
use crate::error::{Error, Result, SensorError};

/// Metres per degree of latitude (mean).
const METRES_PER_DEGREE: f64 = 111_320.0;

// ───────────────────────────────────────────────────────────────
// GNSS
// ───────────────────────────────────────────────────────────────

pub struct SimGnss {
    start_unix: u64,
    polls_per_fix: u64,
    fix_period_ms: u64,
    cold_start_fixes: u64,

    started: bool,
    polls: u64,
    fixes: u64,
    latitude: f64,
    longitude: f64,
}

impl SimGnss {
    /// A receiver producing one solution every `polls_per_fix` polls, each
    /// `fix_period_ms` apart in receiver time, starting at `start_unix`.
    pub fn new(start_unix: u64, polls_per_fix: u64, fix_period_ms: u64) -> Self {
        Self {
            start_unix,
            polls_per_fix: polls_per_fix.max(1),
            fix_period_ms: fix_period_ms.max(1),
            cold_start_fixes: 3,
            started: false,
            polls: 0,
            fixes: 0,
            latitude: 49.2606,
            longitude: -123.2460,
        }
    }

    /// Solutions produced before `time_valid` is reported.
    pub fn with_cold_start(mut self, fixes: u64) -> Self {
        self.cold_start_fixes = fixes;
        self
    }

    pub fn at(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = latitude;
        self.longitude = longitude;
        self
    }

    fn speed_mm_s(&self) -> i32 {
        10_000 + 400 * ((self.fixes % 10) as i32 - 5)
    }

    fn solution(&self) -> GnssFix {
        let elapsed_ms = self.fixes * self.fix_period_ms;
        GnssFix {
            unix_time: self.start_unix + elapsed_ms / 1_000,
            nanos: ((elapsed_ms % 1_000) * 1_000_000) as u32,
            time_valid: self.fixes > self.cold_start_fixes,
            latitude_e7: (self.latitude * 10_000_000.0) as i32,
            longitude_e7: (self.longitude * 10_000_000.0) as i32,
            altitude_msl_mm: 80_000 + 250 * (self.fixes % 20) as i32,
            ground_speed_mm_s: self.speed_mm_s(),
            heading_e5: 0,
            horizontal_acc_mm: 2_400,
            vertical_acc_mm: 3_800,
            satellites: 11,
        }
    }
}

impl GnssPort for SimGnss {
    fn begin(&mut self, nav_rate_hz: u8) -> Result<()> {
        if nav_rate_hz == 0 || nav_rate_hz > 10 {
            return Err(Error::Init("navigation rate must be 1-10 Hz"));
        }
        self.started = true;
        info!("SimGnss: navigation rate {} Hz", nav_rate_hz);
        Ok(())
    }

    fn latest(&mut self) -> Option<GnssFix> {
        if !self.started {
            return None;
        }
        self.polls += 1;
        if self.polls % self.polls_per_fix == 0 {
            let metres = f64::from(self.speed_mm_s()) / 1_000.0 * self.fix_period_ms as f64 / 1_000.0;
            self.latitude += metres / METRES_PER_DEGREE;
            self.fixes += 1;
        }
        (self.fixes > 0).then(|| self.solution())
    }
}

// ───────────────────────────────────────────────────────────────
// Thermocouple
// ───────────────────────────────────────────────────────────────

pub struct SimThermocouple {
    base_celsius: f32,
    reads: u32,
    open_circuit: bool,
}

impl SimThermocouple {
    pub fn new(base_celsius: f32) -> Self {
        Self {
            base_celsius,
            reads: 0,
            open_circuit: false,
        }
    }

    /// Disconnect or reconnect the probe.
    pub fn set_open_circuit(&mut self, open: bool) {
        self.open_circuit = open;
    }
}

impl ThermocouplePort for SimThermocouple {
    fn begin(&mut self) -> Result<()> {
        Ok(())
    }

    fn probe_celsius(&mut self) -> core::result::Result<f32, SensorError> {
        if self.open_circuit {
            return Err(SensorError::OpenCircuit);
        }
        self.reads = self.reads.wrapping_add(1);
        // Triangle wave, 0..30 °C over 600 reads.
        let phase = (self.reads % 600) as f32;
        let swing = if phase < 300.0 { phase } else { 600.0 - phase };
        Ok(self.base_celsius + swing / 10.0)
    }

    fn internal_celsius(&mut self) -> core::result::Result<f32, SensorError> {
        Ok(self.base_celsius)
    }
}
