//! Satellite-navigation sensor.
//!
//! Wraps a [`GnssPort`] and derives motion values the receiver does not
//! report directly:
//!
//! - horizontal acceleration from successive ground speeds,
//! - vertical speed from successive altitudes,
//! - vertical acceleration from successive vertical speeds.
//!
//! Position is only released inside the configured geofence (a green list
//! of lat/lon boxes) unless the override is switched on.

use log::{debug, info};

use super::{HandleStats, Handleable, Sensor};
use crate::app::ports::{GnssFix, GnssPort, TimeSource};
use crate::error::{Error, Result, SensorError};
use crate::event_buffer::Value;

/// Navigation solutions per second requested at bring-up.
pub const NAV_RATE_HZ: u8 = 4;

/// Maximum number of geofence boxes.
pub const MAX_GEOBOXES: usize = 8;

/// Reported accuracy for degenerate estimates (metres).
const ACCURACY_CEILING_M: f64 = 10_000.0;
const ACCURACY_FLOOR_M: f64 = 0.0001;

const US_PER_SEC: f64 = 1_000_000.0;

/// Placeholder reported for positions outside the geofence.
pub const HIDDEN_POSITION: &str = "?";

/// Axis-aligned lat/lon box (degrees).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBox {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

impl GeoBox {
    pub const fn new(min_lon: f64, max_lon: f64, min_lat: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            max_lon,
            min_lat,
            max_lat,
        }
    }

    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        (self.min_lon..=self.max_lon).contains(&lon) && (self.min_lat..=self.max_lat).contains(&lat)
    }
}

pub struct GpsSensor<G> {
    gnss: G,
    geofence: heapless::Vec<GeoBox, MAX_GEOBOXES>,
    override_geofence: bool,

    fix: Option<GnssFix>,
    last_update_us: Option<u64>,
    last_horizontal_speed: f64,
    last_altitude: f64,
    horizontal_acceleration: f64,
    vertical_speed: f64,
    vertical_acceleration: f64,

    speed_update: Option<f64>,
    stats: HandleStats,
}

impl<G: GnssPort> GpsSensor<G> {
    pub fn new(gnss: G) -> Self {
        Self {
            gnss,
            geofence: heapless::Vec::new(),
            override_geofence: false,
            fix: None,
            last_update_us: None,
            last_horizontal_speed: 0.0,
            last_altitude: 0.0,
            horizontal_acceleration: 0.0,
            vertical_speed: 0.0,
            vertical_acceleration: 0.0,
            speed_update: None,
            stats: HandleStats::default(),
        }
    }

    /// Add a green-list box. With no boxes, position is always hidden.
    pub fn with_geobox(mut self, area: GeoBox) -> Result<Self> {
        self.geofence
            .push(area)
            .map_err(|_| Error::Config("geofence capacity exhausted"))?;
        Ok(self)
    }

    /// Flip the geofence override. Returns the new state.
    pub fn toggle_override(&mut self) -> bool {
        self.override_geofence = !self.override_geofence;
        info!(
            "GPS: geofence override {}",
            if self.override_geofence { "ON" } else { "OFF" }
        );
        self.override_geofence
    }

    /// Ground speed (m/s) of the newest fix not yet taken.
    pub fn take_speed_update(&mut self) -> Option<f64> {
        self.speed_update.take()
    }

    fn ingest(&mut self, fix: GnssFix) {
        let this_us = fix
            .unix_time
            .saturating_mul(1_000_000)
            .saturating_add(u64::from(fix.nanos / 1_000));
        if self.last_update_us == Some(this_us) {
            return;
        }

        let speed = f64::from(fix.ground_speed_mm_s) / 1_000.0;
        let altitude = f64::from(fix.altitude_msl_mm) / 1_000.0;

        if let Some(last_us) = self.last_update_us.filter(|&last| this_us > last) {
            let elapsed = (this_us - last_us) as f64;
            self.horizontal_acceleration = (speed - self.last_horizontal_speed) * US_PER_SEC / elapsed;
            let vertical_speed = (altitude - self.last_altitude) * US_PER_SEC / elapsed;
            self.vertical_acceleration = (vertical_speed - self.vertical_speed) * US_PER_SEC / elapsed;
            self.vertical_speed = vertical_speed;
        }

        self.last_horizontal_speed = speed;
        self.last_altitude = altitude;
        self.last_update_us = Some(this_us);
        self.speed_update = Some(speed);
        self.fix = Some(fix);

        debug!(
            "GPS: SIV {} acc h {:.2}m v {:.2}m",
            fix.satellites,
            f64::from(fix.horizontal_acc_mm) / 1_000.0,
            f64::from(fix.vertical_acc_mm) / 1_000.0
        );
    }

    fn current(&self) -> core::result::Result<&GnssFix, SensorError> {
        self.fix.as_ref().ok_or(SensorError::NoFix)
    }

    fn position_visible(&self, lon: f64, lat: f64) -> bool {
        self.override_geofence || self.geofence.iter().any(|area| area.contains(lon, lat))
    }

    fn degrees(fix: &GnssFix) -> (f64, f64) {
        (
            f64::from(fix.longitude_e7) / 10_000_000.0,
            f64::from(fix.latitude_e7) / 10_000_000.0,
        )
    }

    // ── Accessors (dispatcher slots) ──

    /// Latitude in degrees, or `"?"` outside the geofence.
    pub fn latitude(&self) -> core::result::Result<Value, SensorError> {
        let (lon, lat) = Self::degrees(self.current()?);
        Ok(if self.position_visible(lon, lat) {
            Value::Float(lat)
        } else {
            Value::from(HIDDEN_POSITION)
        })
    }

    /// Longitude in degrees, or `"?"` outside the geofence.
    pub fn longitude(&self) -> core::result::Result<Value, SensorError> {
        let (lon, lat) = Self::degrees(self.current()?);
        Ok(if self.position_visible(lon, lat) {
            Value::Float(lon)
        } else {
            Value::from(HIDDEN_POSITION)
        })
    }

    /// Heading in whole degrees.
    pub fn heading(&self) -> core::result::Result<i64, SensorError> {
        Ok(i64::from(self.current()?.heading_e5 / 100_000))
    }

    /// Ground speed (m/s).
    pub fn horizontal_speed(&self) -> core::result::Result<f64, SensorError> {
        Ok(f64::from(self.current()?.ground_speed_mm_s) / 1_000.0)
    }

    /// m/s²
    pub fn horizontal_acceleration(&self) -> core::result::Result<f64, SensorError> {
        self.current()?;
        Ok(self.horizontal_acceleration)
    }

    pub fn horizontal_accuracy(&self) -> core::result::Result<f64, SensorError> {
        Ok(clamp_accuracy(self.current()?.horizontal_acc_mm))
    }

    /// Altitude above mean sea level (m); 0 while the horizontal estimate is degenerate.
    pub fn altitude(&self) -> core::result::Result<f64, SensorError> {
        let fix = self.current()?;
        if f64::from(fix.horizontal_acc_mm) / 1_000.0 < ACCURACY_FLOOR_M {
            return Ok(0.0);
        }
        Ok(f64::from(fix.altitude_msl_mm) / 1_000.0)
    }

    /// m/s
    pub fn vertical_speed(&self) -> core::result::Result<f64, SensorError> {
        self.current()?;
        Ok(self.vertical_speed)
    }

    /// m/s²
    pub fn vertical_acceleration(&self) -> core::result::Result<f64, SensorError> {
        self.current()?;
        Ok(self.vertical_acceleration)
    }

    pub fn vertical_accuracy(&self) -> core::result::Result<f64, SensorError> {
        Ok(clamp_accuracy(self.current()?.vertical_acc_mm))
    }

    pub fn satellites_in_view(&self) -> core::result::Result<u8, SensorError> {
        Ok(self.current()?.satellites)
    }

    pub fn gnss(&self) -> &G {
        &self.gnss
    }

    pub fn gnss_mut(&mut self) -> &mut G {
        &mut self.gnss
    }
}

fn clamp_accuracy(mm: u32) -> f64 {
    let metres = f64::from(mm) / 1_000.0;
    if !(ACCURACY_FLOOR_M..=ACCURACY_CEILING_M).contains(&metres) {
        ACCURACY_CEILING_M
    } else {
        metres
    }
}

impl<G: GnssPort> Handleable for GpsSensor<G> {
    fn begin(&mut self) -> Result<()> {
        self.gnss
            .begin(NAV_RATE_HZ)
            .map_err(|_| Error::Init("GNSS receiver did not respond"))
    }

    fn handle(&mut self) {
        if let Some(fix) = self.gnss.latest() {
            self.ingest(fix);
        }
    }
}

impl<G: GnssPort> Sensor for GpsSensor<G> {
    fn human_name(&self) -> &'static str {
        "GPS"
    }

    fn handle_stats(&self) -> &HandleStats {
        &self.stats
    }

    fn handle_stats_mut(&mut self) -> &mut HandleStats {
        &mut self.stats
    }
}

impl<G: GnssPort> TimeSource for GpsSensor<G> {
    fn unix_time(&self) -> Option<u64> {
        self.fix
            .filter(|fix| fix.time_valid)
            .map(|fix| fix.unix_time)
    }
}
