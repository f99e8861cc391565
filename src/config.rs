//! System configuration parameters
//!
//! All tunable parameters for the telemetry unit. Values can be loaded from
//! a JSON document; missing fields fall back to [`TelemetryConfig::default`].

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::event_buffer::MIN_BATCH_CAPACITY;

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    // --- Identity ---
    /// Human-readable vehicle name, used in log banners.
    pub vehicle_name: String,
    /// Event name batches are published under.
    pub publish_event: String,

    // --- Batching / publish channel ---
    /// Serialized byte capacity of one batch.
    pub batch_capacity_bytes: usize,
    /// Events the publish channel keeps in RAM before spilling to storage.
    pub ram_queue_events: usize,
    /// Directory the publish channel persists its queue in.
    pub storage_path: String,
    /// Period between batch publish/rotation (milliseconds)
    pub publish_interval_ms: u32,
    /// Publish as a private event.
    pub private_publish: bool,
    /// Request delivery acknowledgement from the cloud.
    pub publish_with_ack: bool,
    /// When false, batches are rotated with `reset_data` instead of published.
    pub publish_enabled: bool,

    // --- Scheduling ---
    /// Scheduling loop period (milliseconds)
    pub tick_interval_ms: u32,
    /// Whether dispatcher sampling starts enabled after boot.
    pub logging_enabled_at_boot: bool,
    /// Measure every sensor `handle()` call.
    pub benchmark_handles: bool,
    /// Period between diagnostics reports (milliseconds, 0 = off)
    pub diagnostics_interval_ms: u32,

    // --- CAN ---
    /// Bus bitrate handed to the transport at bring-up.
    pub can_bitrate: u32,
    /// Upper bound on frames drained per tick.
    pub max_frames_per_tick: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            vehicle_name: "Vehicle".into(),
            publish_event: "telemetry".into(),

            batch_capacity_bytes: 1024,
            ram_queue_events: 32,
            storage_path: "/usr/pubqueue".into(),
            publish_interval_ms: 10_000, // every 10 s
            private_publish: true,
            publish_with_ack: true,
            publish_enabled: true,

            tick_interval_ms: 50, // 20 Hz
            logging_enabled_at_boot: true,
            benchmark_handles: false,
            diagnostics_interval_ms: 0,

            can_bitrate: 500_000,
            max_frames_per_tick: 32,
        }
    }
}

impl TelemetryConfig {
    /// Parse a JSON document and validate it.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|_| Error::Config("malformed JSON"))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the tick loop cannot operate with.
    pub fn validate(&self) -> Result<()> {
        if self.publish_event.is_empty() {
            return Err(Error::Config("publish_event must not be empty"));
        }
        if self.batch_capacity_bytes < MIN_BATCH_CAPACITY {
            return Err(Error::Config("batch_capacity_bytes below empty-batch size"));
        }
        if self.ram_queue_events == 0 {
            return Err(Error::Config("ram_queue_events must be non-zero"));
        }
        if self.tick_interval_ms == 0 {
            return Err(Error::Config("tick_interval_ms must be non-zero"));
        }
        if self.publish_interval_ms < self.tick_interval_ms {
            return Err(Error::Config("publish_interval_ms shorter than one tick"));
        }
        if self.max_frames_per_tick == 0 {
            return Err(Error::Config("max_frames_per_tick must be non-zero"));
        }
        if self.can_bitrate == 0 {
            return Err(Error::Config("can_bitrate must be non-zero"));
        }
        Ok(())
    }

    /// Publish interval expressed in scheduling ticks (at least one).
    pub fn publish_interval_ticks(&self) -> u64 {
        u64::from((self.publish_interval_ms / self.tick_interval_ms).max(1))
    }

    /// Diagnostics interval in ticks, `None` when reporting is off.
    pub fn diagnostics_interval_ticks(&self) -> Option<u64> {
        if self.diagnostics_interval_ms == 0 {
            return None;
        }
        Some(u64::from(
            (self.diagnostics_interval_ms / self.tick_interval_ms).max(1),
        ))
    }
}
