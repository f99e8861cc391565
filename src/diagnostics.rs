//! Runtime diagnostics.
//!
//! A [`DiagnosticsReport`] is a point-in-time snapshot of the tick loop:
//! per-sensor handle timing (for checking the per-tick budget), batch fill,
//! publish-queue depth and bus counters. The app logs one periodically and
//! a console can request one on demand.

use core::fmt;

use serde::Serialize;

use crate::app::ports::{CanTransport, PublishChannel};
use crate::can::{CanRouter, RouterStats};
use crate::event_buffer::EventBuffer;
use crate::sensors::SensorHandler;

/// Sensors listed in one report.
pub const MAX_REPORTED_SENSORS: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SensorTiming {
    pub name: &'static str,
    pub longest_handle_us: u64,
    pub benchmarked_calls: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BusCounters {
    pub received: u64,
    pub routed: u64,
    pub dropped: u64,
    pub send_failures: u64,
}

impl From<RouterStats> for BusCounters {
    fn from(s: RouterStats) -> Self {
        Self {
            received: s.received,
            routed: s.routed,
            dropped: s.dropped,
            send_failures: s.send_failures,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticsReport {
    pub tick: u64,
    pub faults: u32,
    pub sensors: heapless::Vec<SensorTiming, MAX_REPORTED_SENSORS>,
    pub batch_entries: usize,
    pub batch_bytes: usize,
    pub batch_capacity: usize,
    pub publish_pending: usize,
    pub bus: BusCounters,
}

impl DiagnosticsReport {
    pub fn collect<P, T, const N: usize>(
        tick: u64,
        faults: u32,
        sensors: &SensorHandler<'_, N>,
        buffer: &EventBuffer<P>,
        router: &CanRouter<'_, T>,
    ) -> Self
    where
        P: PublishChannel,
        T: CanTransport,
    {
        let mut timings = heapless::Vec::new();
        for cell in sensors.iter() {
            // A sensor borrowed elsewhere is simply left out of this report.
            let Ok(sensor) = cell.try_borrow() else {
                continue;
            };
            let stats = sensor.handle_stats();
            let entry = SensorTiming {
                name: sensor.human_name(),
                longest_handle_us: stats.longest_us(),
                benchmarked_calls: stats.calls(),
            };
            if timings.push(entry).is_err() {
                break;
            }
        }

        let batch = buffer.batch();
        Self {
            tick,
            faults,
            sensors: timings,
            batch_entries: batch.len(),
            batch_bytes: batch.bytes(),
            batch_capacity: buffer.capacity(),
            publish_pending: buffer.pending_count(),
            bus: router.stats().into(),
        }
    }

    /// Batch fill in percent.
    pub fn batch_fill_pct(&self) -> u8 {
        if self.batch_capacity == 0 {
            return 0;
        }
        ((self.batch_bytes * 100) / self.batch_capacity).min(100) as u8
    }

    pub fn to_json(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }
}

impl fmt::Display for DiagnosticsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tick={} faults={} batch={}/{}B ({} entries, {}%) pending={} can rx={} routed={} dropped={}",
            self.tick,
            self.faults,
            self.batch_bytes,
            self.batch_capacity,
            self.batch_entries,
            self.batch_fill_pct(),
            self.publish_pending,
            self.bus.received,
            self.bus.routed,
            self.bus.dropped,
        )?;
        for s in &self.sensors {
            write!(f, " {}={}us", s.name, s.longest_handle_us)?;
        }
        Ok(())
    }
}
