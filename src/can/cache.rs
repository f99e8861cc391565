//! Latest-frame-per-id store.
//!
//! Routed frames land here so dispatcher slots can sample bus values at
//! their own cadence instead of on every frame.

use core::cell::RefCell;

use heapless::FnvIndexMap;
use log::warn;

use super::CanMessage;
use crate::error::SensorError;

/// Distinct ids a cache can hold (power of two).
pub const MAX_CACHED_IDS: usize = 16;

#[derive(Debug, Clone, Default)]
pub struct FrameCache {
    frames: FnvIndexMap<u32, CanMessage, MAX_CACHED_IDS>,
    updates: u64,
}

impl FrameCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `frame`, replacing any earlier frame with the same id.
    /// Returns `false` if the id is new and the cache is full.
    pub fn update(&mut self, frame: &CanMessage) -> bool {
        let stored = match self.frames.get_mut(&frame.id) {
            Some(slot) => {
                *slot = *frame;
                true
            }
            None => self.frames.insert(frame.id, *frame).is_ok(),
        };
        if stored {
            self.updates += 1;
        }
        stored
    }

    /// Latest frame seen for `id`.
    pub fn get(&self, id: u32) -> Option<&CanMessage> {
        self.frames.get(&id)
    }

    /// Latest payload for `id`, or [`SensorError::NotReady`] before the first frame.
    pub fn payload(&self, id: u32) -> Result<&[u8], SensorError> {
        self.get(id)
            .map(CanMessage::data_slice)
            .ok_or(SensorError::NotReady)
    }

    /// Big-endian unsigned value from `len` payload bytes starting at `offset`.
    pub fn read_be(&self, id: u32, offset: usize, len: usize) -> Result<u32, SensorError> {
        let payload = self.payload(id)?;
        let end = offset.checked_add(len).ok_or(SensorError::OutOfRange)?;
        let bytes = payload
            .get(offset..end)
            .filter(|b| !b.is_empty() && b.len() <= 4)
            .ok_or(SensorError::OutOfRange)?;
        Ok(bytes.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b)))
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Total frames stored since creation.
    pub fn updates(&self) -> u64 {
        self.updates
    }

    /// A route handler that records into `cache`.
    pub fn recorder(cache: &RefCell<Self>) -> impl FnMut(&CanMessage) + '_ {
        move |frame| match cache.try_borrow_mut() {
            Ok(mut c) => {
                if !c.update(frame) {
                    warn!("FrameCache: full, frame 0x{:X} dropped", frame.id);
                }
            }
            Err(_) => warn!("FrameCache: busy, frame 0x{:X} dropped", frame.id),
        }
    }
}
