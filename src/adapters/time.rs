//! Host time adapter.
//!
//! Monotonic uptime comes from `std::time::Instant`. The wall clock starts
//! invalid, like a unit that has not yet heard from the network or the
//! GNSS receiver, and runs forward from the moment it is set.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::app::ports::TimePort;

/// Anything earlier is treated as an unsynced clock.
const EPOCH_2020: u64 = 1_577_836_800;

pub struct SystemClock {
    start: Instant,
    /// Unix seconds at the moment of `set`, and when that was.
    wall: Option<(u64, Instant)>,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    /// Clock with no valid wall time.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            wall: None,
        }
    }

    /// Clock seeded from the host's system time, if it looks synced.
    pub fn from_host() -> Self {
        let mut clock = Self::new();
        if let Ok(now) = SystemTime::now().duration_since(UNIX_EPOCH) {
            if now.as_secs() >= EPOCH_2020 {
                clock.set_unix_time(now.as_secs());
            }
        }
        clock
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start.elapsed().as_secs()
    }
}

impl TimePort for SystemClock {
    fn uptime_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }

    fn unix_time(&self) -> Option<u64> {
        self.wall
            .map(|(secs, at)| secs + at.elapsed().as_secs())
    }

    fn set_unix_time(&mut self, secs: u64) {
        self.wall = Some((secs, Instant::now()));
    }
}
