//! Telemetry batch buffer.
//!
//! Accumulates typed samples into one JSON-shaped batch and hands finished
//! batches to the at-least-once [`PublishChannel`].
//!
//! ```text
//! { "time": <unix secs>, "d": [ { "t": "<tag>", "d": <int|float|text> }, ... ] }
//! ```
//!
//! The serialized size of the open batch is tracked exactly. Every `add`
//! measures the entry it is about to append and refuses it with
//! [`Error::Overflow`] if the batch would exceed its capacity, so a failed
//! add never leaves a partial entry behind.

use std::io;

use log::{debug, info, warn};
use serde::Serialize;

use crate::app::ports::{PublishChannel, SampleSink};
use crate::config::TelemetryConfig;
use crate::error::{Error, Result};

/// Smallest capacity that can hold an empty batch with any 64-bit timestamp.
pub const MIN_BATCH_CAPACITY: usize = 64;

// ═══════════════════════════════════════════════════════════════
//  Entry types
// ═══════════════════════════════════════════════════════════════

/// A sample value. Serialized bare (`21.5`, `4`, `"47.123456"`).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// JSON has no NaN or infinity; such floats cannot go on the wire.
    pub fn is_encodable(&self) -> bool {
        match self {
            Self::Float(f) => f.is_finite(),
            _ => true,
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Self::Int(v.into())
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Self::Int(v.into())
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Int(v.into())
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// One tagged sample. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryEvent {
    #[serde(rename = "t")]
    pub tag: String,
    #[serde(rename = "d")]
    pub value: Value,
}

/// Delivery options forwarded to the publish channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryFlags {
    pub private: bool,
    pub with_ack: bool,
}

impl DeliveryFlags {
    pub const PRIVATE_WITH_ACK: Self = Self {
        private: true,
        with_ack: true,
    };

    pub fn from_config(config: &TelemetryConfig) -> Self {
        Self {
            private: config.private_publish,
            with_ack: config.publish_with_ack,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Batch
// ═══════════════════════════════════════════════════════════════

/// Borrowed wire view; field order fixes the output layout.
#[derive(Serialize)]
struct WireBatch<'b> {
    time: u64,
    d: &'b [TelemetryEvent],
}

/// Ordered entries plus the capture timestamp taken when the batch opened.
#[derive(Debug, Clone, PartialEq)]
pub struct EventBatch {
    time: u64,
    entries: Vec<TelemetryEvent>,
    /// Exact length of `encode()` output.
    bytes: usize,
}

impl EventBatch {
    fn open(time: u64) -> Result<Self> {
        let bytes = encoded_len(&WireBatch { time, d: &[] })?;
        Ok(Self {
            time,
            entries: Vec::new(),
            bytes,
        })
    }

    /// Capture timestamp (seconds since epoch).
    pub fn time(&self) -> u64 {
        self.time
    }

    pub fn entries(&self) -> &[TelemetryEvent] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialized size in bytes.
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    fn encode(&self) -> Result<String> {
        serde_json::to_string(&WireBatch {
            time: self.time,
            d: &self.entries,
        })
        .map_err(|_| Error::Encode)
    }
}

/// `io::Write` sink that only counts.
struct ByteCounter(usize);

impl io::Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn encoded_len<T: Serialize + ?Sized>(value: &T) -> Result<usize> {
    let mut counter = ByteCounter(0);
    serde_json::to_writer(&mut counter, value).map_err(|_| Error::Encode)?;
    Ok(counter.0)
}

// ═══════════════════════════════════════════════════════════════
//  Buffer
// ═══════════════════════════════════════════════════════════════

/// Owns the open batch and the publish channel it drains into.
pub struct EventBuffer<P> {
    channel: P,
    capacity: usize,
    flags: DeliveryFlags,
    batch: EventBatch,
}

impl<P: PublishChannel> EventBuffer<P> {
    /// Configure `channel` and open the first batch stamped `now`.
    pub fn new(
        mut channel: P,
        capacity: usize,
        ram_queue_events: usize,
        storage_path: &str,
        flags: DeliveryFlags,
        now: u64,
    ) -> Result<Self> {
        if capacity < MIN_BATCH_CAPACITY {
            return Err(Error::Config("batch capacity below empty-batch size"));
        }
        channel.configure(ram_queue_events, storage_path);
        Ok(Self {
            channel,
            capacity,
            flags,
            batch: EventBatch::open(now)?,
        })
    }

    pub fn from_config(channel: P, config: &TelemetryConfig, now: u64) -> Result<Self> {
        Self::new(
            channel,
            config.batch_capacity_bytes,
            config.ram_queue_events,
            &config.storage_path,
            DeliveryFlags::from_config(config),
            now,
        )
    }

    /// Append one entry, or fail leaving the batch untouched.
    ///
    /// Fails with [`Error::Encode`] for a non-finite float and with
    /// [`Error::Overflow`] when the entry does not fit.
    pub fn add(&mut self, tag: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        if !value.is_encodable() {
            warn!("EventBuffer: '{}' rejected, non-finite value", tag);
            return Err(Error::Encode);
        }
        let event = TelemetryEvent {
            tag: tag.to_owned(),
            value,
        };
        let separator = usize::from(!self.batch.entries.is_empty());
        let needed = encoded_len(&event)? + separator;
        let remaining = self.remaining();
        if needed > remaining {
            debug!("EventBuffer: '{}' needs {}B, {}B free", tag, needed, remaining);
            return Err(Error::Overflow { needed, remaining });
        }
        self.batch.entries.push(event);
        self.batch.bytes += needed;
        Ok(())
    }

    /// Serialized form of the open batch. Does not modify it.
    pub fn finalize(&self) -> Result<String> {
        self.batch.encode()
    }

    /// Finalize, submit under `name`, and open a fresh batch stamped `now`.
    ///
    /// Returns the submitted payload. The batch is rotated even when the
    /// channel refuses it, in which case [`Error::PublishRejected`] is returned.
    pub fn publish(&mut self, name: &str, now: u64) -> Result<String> {
        let payload = self.finalize()?;
        let accepted = self.channel.publish(name, &payload, self.flags);
        let entries = self.batch.len();
        self.batch = EventBatch::open(now)?;

        if !accepted {
            warn!("EventBuffer: '{}' rejected by channel ({} entries dropped)", name, entries);
            return Err(Error::PublishRejected);
        }
        info!(
            "EventBuffer: published '{}' ({} entries, {}B, {} pending)",
            name,
            entries,
            payload.len(),
            self.channel.pending_count()
        );
        Ok(payload)
    }

    /// Finalize and discard without touching the channel, then open a fresh batch.
    pub fn reset_data(&mut self, now: u64) -> Result<String> {
        let payload = self.finalize()?;
        self.batch = EventBatch::open(now)?;
        Ok(payload)
    }

    /// Re-open an empty batch with a new capture time. Returns `false`
    /// (and changes nothing) if the batch already holds entries.
    pub fn restamp_if_empty(&mut self, now: u64) -> Result<bool> {
        if !self.batch.is_empty() {
            return Ok(false);
        }
        self.batch = EventBatch::open(now)?;
        Ok(true)
    }

    /// Give the publish channel its cooperative flush/retry slot.
    pub fn tick(&mut self) {
        self.channel.tick();
    }

    pub fn pending_count(&self) -> usize {
        self.channel.pending_count()
    }

    pub fn batch(&self) -> &EventBatch {
        &self.batch
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes still free in the open batch.
    pub fn remaining(&self) -> usize {
        self.capacity.saturating_sub(self.batch.bytes)
    }

    pub fn channel(&self) -> &P {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut P {
        &mut self.channel
    }
}

impl<P: PublishChannel> SampleSink for EventBuffer<P> {
    fn add(&mut self, tag: &str, value: Value) -> Result<()> {
        EventBuffer::add(self, tag, value)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
