//! Interval-driven sampling of sensor accessors into the batch buffer.
//!
//! ```text
//!   ┌──────────── CommandSlot ────────────┐
//!   │ &RefCell<S> ─▶ accessor ─▶ Value     │
//!   │ tag · interval · last_fired · prec.  │
//!   └──────────────────┬───────────────────┘
//!                      │ due?  (tick - last_fired >= interval)
//!                      ▼
//!   Dispatcher::run ──▶ SampleSink::add ──▶ EventBuffer
//!          │
//!          └─ faults ─▶ EventSink (AppEvent::Fault)
//! ```
//!
//! Intervals count scheduling ticks, never wall-clock time, so the firing
//! pattern is independent of loop jitter. The slot set is fixed when
//! [`DispatcherBuilder::build`] runs.

use core::cell::RefCell;

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::{EventSink, SampleSink};
use crate::error::{Error, Result, SensorError};
use crate::event_buffer::Value;

/// Upper bound on slots in one dispatcher (stack-allocated).
pub const MAX_SLOTS: usize = 16;

type Accessor<'a> = Box<dyn Fn() -> core::result::Result<Value, SensorError> + 'a>;

// ═══════════════════════════════════════════════════════════════
//  Command slot
// ═══════════════════════════════════════════════════════════════

/// One periodic sample: a borrowed sensor, how to read it, and when.
pub struct CommandSlot<'a> {
    tag: &'static str,
    interval: u64,
    last_fired: u64,
    precision: Option<usize>,
    fire_count: u64,
    read: Accessor<'a>,
}

impl<'a> CommandSlot<'a> {
    /// Bind `accessor` on `sensor` to `tag`, firing every `interval` ticks.
    ///
    /// The sensor is only borrowed for the duration of each read. If it is
    /// mutably borrowed at that moment the read fails with [`SensorError::Busy`].
    pub fn new<S, R, F>(
        sensor: &'a RefCell<S>,
        tag: &'static str,
        accessor: F,
        interval: u64,
    ) -> Result<Self>
    where
        S: ?Sized + 'a,
        R: Into<Value>,
        F: Fn(&S) -> core::result::Result<R, SensorError> + 'a,
    {
        if interval == 0 {
            return Err(Error::Config("slot interval must be at least one tick"));
        }
        let read: Accessor<'a> = Box::new(move || {
            let guard = sensor.try_borrow().map_err(|_| SensorError::Busy)?;
            accessor(&*guard).map(Into::into)
        });
        Ok(Self {
            tag,
            interval,
            last_fired: 0,
            precision: None,
            fire_count: 0,
            read,
        })
    }

    /// Render float readings as text with `digits` decimals.
    pub fn with_precision(mut self, digits: usize) -> Self {
        self.precision = Some(digits);
        self
    }

    pub fn tag(&self) -> &'static str {
        self.tag
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    /// Tick on which this slot last fired (0 = never).
    pub fn last_fired(&self) -> u64 {
        self.last_fired
    }

    /// Times the slot came due, including faulted reads.
    pub fn fire_count(&self) -> u64 {
        self.fire_count
    }

    pub fn is_due(&self, tick: u64) -> bool {
        tick.saturating_sub(self.last_fired) >= self.interval
    }

    fn sample(&self) -> core::result::Result<Value, SensorError> {
        let value = (self.read)()?;
        if !value.is_encodable() {
            return Err(SensorError::OutOfRange);
        }
        Ok(render(value, self.precision))
    }
}

impl core::fmt::Debug for CommandSlot<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CommandSlot")
            .field("tag", &self.tag)
            .field("interval", &self.interval)
            .field("last_fired", &self.last_fired)
            .field("precision", &self.precision)
            .finish_non_exhaustive()
    }
}

fn render(value: Value, precision: Option<usize>) -> Value {
    match (value, precision) {
        (Value::Float(f), Some(digits)) => Value::Text(format!("{:.*}", digits, f)),
        (value, _) => value,
    }
}

// ═══════════════════════════════════════════════════════════════
//  Builder
// ═══════════════════════════════════════════════════════════════

/// Configuration-time assembly of a [`Dispatcher`].
pub struct DispatcherBuilder<'a> {
    capacity: usize,
    slots: heapless::Vec<CommandSlot<'a>, MAX_SLOTS>,
}

impl<'a> DispatcherBuilder<'a> {
    /// Room for `capacity` slots (clamped to [`MAX_SLOTS`]).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.min(MAX_SLOTS),
            slots: heapless::Vec::new(),
        }
    }

    /// Register a slot; see [`CommandSlot::new`].
    pub fn add<S, R, F>(
        self,
        sensor: &'a RefCell<S>,
        tag: &'static str,
        accessor: F,
        interval: u64,
    ) -> Result<Self>
    where
        S: ?Sized + 'a,
        R: Into<Value>,
        F: Fn(&S) -> core::result::Result<R, SensorError> + 'a,
    {
        self.slot(CommandSlot::new(sensor, tag, accessor, interval)?)
    }

    /// Register a prebuilt slot.
    pub fn slot(mut self, slot: CommandSlot<'a>) -> Result<Self> {
        if self.slots.len() >= self.capacity {
            return Err(Error::Config("dispatcher slot capacity exhausted"));
        }
        info!(
            "Dispatcher: slot {} '{}' every {} ticks",
            self.slots.len(),
            slot.tag,
            slot.interval
        );
        self.slots
            .push(slot)
            .map_err(|_| Error::Config("dispatcher slot capacity exhausted"))?;
        Ok(self)
    }

    /// Set float precision on the most recently added slot.
    pub fn with_precision(mut self, digits: usize) -> Self {
        if let Some(last) = self.slots.last_mut() {
            last.precision = Some(digits);
        }
        self
    }

    pub fn build(self) -> Dispatcher<'a> {
        Dispatcher {
            slots: self.slots,
            tick: 0,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Dispatcher
// ═══════════════════════════════════════════════════════════════

/// Ordered slots plus the tick counter they are measured against.
pub struct Dispatcher<'a> {
    slots: heapless::Vec<CommandSlot<'a>, MAX_SLOTS>,
    tick: u64,
}

impl<'a> Dispatcher<'a> {
    /// Advance one tick and sample every due slot in registration order.
    ///
    /// Accessor faults and buffer overflows are reported through `events`
    /// once each and never stop later slots. A faulted slot still counts as
    /// fired, so it retries one interval later. Returns the number of
    /// samples appended to `out`.
    pub fn run(&mut self, out: &mut dyn SampleSink, events: &mut dyn EventSink) -> usize {
        self.tick += 1;
        let tick = self.tick;
        let mut appended = 0;

        for slot in self.slots.iter_mut() {
            if !slot.is_due(tick) {
                continue;
            }
            slot.last_fired = tick;
            slot.fire_count += 1;

            let result = slot
                .sample()
                .map_err(Error::from)
                .and_then(|value| out.add(slot.tag, value));
            match result {
                Ok(()) => appended += 1,
                Err(error) => {
                    warn!("Dispatcher: '{}' at tick {}: {}", slot.tag, tick, error);
                    events.emit(&AppEvent::Fault {
                        source: slot.tag,
                        error,
                    });
                }
            }
        }
        appended
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn slots(&self) -> &[CommandSlot<'a>] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
