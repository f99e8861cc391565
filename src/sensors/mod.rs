//! Sensor capability and the ordered [`Handler`] that drives it.
//!
//! Sensors are owned by the caller (one `RefCell` each) and only borrowed
//! here, so the same instance can be handled every tick and read by
//! dispatcher slots in between.
//!
//! ```text
//!   main ── owns ──▶ RefCell<GpsSensor>, RefCell<ThermoSensor>, ...
//!                        ▲                     ▲
//!          Handler ──────┘ (&'a, ordered)      └── CommandSlot accessors
//! ```

pub mod gps;
pub mod thermo;

use core::cell::RefCell;

use log::{error, info, warn};

use crate::app::ports::TimePort;
use crate::error::{Error, Result};

// ═══════════════════════════════════════════════════════════════
//  Capability traits
// ═══════════════════════════════════════════════════════════════

/// Anything driven once per tick: sensors, indicators, inputs.
pub trait Handleable {
    /// One-time bring-up. An error here is fatal for the caller.
    fn begin(&mut self) -> Result<()> {
        Ok(())
    }

    /// Bounded, non-blocking incremental work.
    fn handle(&mut self);
}

/// Timing record kept by every sensor for [`Sensor::benchmarked_handle`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandleStats {
    longest_us: u64,
    last_us: u64,
    calls: u64,
}

impl HandleStats {
    pub fn record(&mut self, elapsed_us: u64) {
        self.longest_us = self.longest_us.max(elapsed_us);
        self.last_us = elapsed_us;
        self.calls += 1;
    }

    /// Longest single `handle()` observed (µs). Never decreases.
    pub fn longest_us(&self) -> u64 {
        self.longest_us
    }

    pub fn last_us(&self) -> u64 {
        self.last_us
    }

    /// Number of benchmarked calls.
    pub fn calls(&self) -> u64 {
        self.calls
    }
}

/// A sampled device.
pub trait Sensor: Handleable {
    /// Stable diagnostic label.
    fn human_name(&self) -> &'static str;

    fn handle_stats(&self) -> &HandleStats;

    fn handle_stats_mut(&mut self) -> &mut HandleStats;

    /// Same effect as [`Handleable::handle`], timed against `clock`.
    fn benchmarked_handle(&mut self, clock: &dyn TimePort) {
        let start = clock.uptime_us();
        self.handle();
        let elapsed = clock.uptime_us().saturating_sub(start);
        self.handle_stats_mut().record(elapsed);
    }

    fn longest_handle_time_us(&self) -> u64 {
        self.handle_stats().longest_us()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Handler
// ═══════════════════════════════════════════════════════════════

/// Ordered, bounded set of borrowed capability implementers.
pub struct Handler<'a, T: ?Sized, const N: usize> {
    items: heapless::Vec<&'a RefCell<T>, N>,
}

/// The sensor set driven by the tick loop.
pub type SensorHandler<'a, const N: usize> = Handler<'a, dyn Sensor + 'a, N>;

impl<'a, T: ?Sized + Handleable, const N: usize> Handler<'a, T, N> {
    pub const fn new() -> Self {
        Self {
            items: heapless::Vec::new(),
        }
    }

    /// Append `item`; it is handled after everything added before it.
    pub fn add(&mut self, item: &'a RefCell<T>) -> Result<()> {
        self.items
            .push(item)
            .map_err(|_| Error::Config("handler capacity exhausted"))
    }

    /// Remove `item` by identity. Returns `false` if it was not registered.
    pub fn remove<U: ?Sized>(&mut self, item: &RefCell<U>) -> bool {
        let target = item as *const RefCell<U>;
        match self
            .items
            .iter()
            .position(|&held| core::ptr::addr_eq(held as *const RefCell<T>, target))
        {
            Some(index) => {
                self.items.remove(index);
                true
            }
            None => false,
        }
    }

    /// Bring up every item in order, stopping at the first failure.
    pub fn begin(&self) -> Result<()> {
        for (index, item) in self.items.iter().enumerate() {
            let mut item = item
                .try_borrow_mut()
                .map_err(|_| Error::Init("handler item borrowed during begin"))?;
            if let Err(e) = item.begin() {
                error!("Handler: item {} failed to start: {}", index, e);
                return Err(e);
            }
        }
        info!("Handler: {} items started", self.items.len());
        Ok(())
    }

    /// Forward one `handle()` to every item in order.
    pub fn handle(&self) {
        for item in self.items.iter() {
            match item.try_borrow_mut() {
                Ok(mut item) => item.handle(),
                Err(_) => warn!("Handler: item busy, skipped this tick"),
            }
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a RefCell<T>> + '_ {
        self.items.iter().copied()
    }
}

impl<'a, T: ?Sized + Handleable, const N: usize> Default for Handler<'a, T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, const N: usize> Handler<'a, dyn Sensor + 'a, N> {
    /// [`handle`](Self::handle), with every call timed against `clock`.
    pub fn benchmarked_handle(&self, clock: &dyn TimePort) {
        for item in self.items.iter() {
            match item.try_borrow_mut() {
                Ok(mut sensor) => sensor.benchmarked_handle(clock),
                Err(_) => warn!("Handler: sensor busy, skipped this tick"),
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
