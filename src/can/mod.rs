//! CAN bus boundary: frame type, identifier router, and transport helpers.
//!
//! ```text
//!   CanTransport ──▶ [InterruptGated] ──▶ CanRouter::handle ──▶ route(id) ──▶ handler
//!                                                            └─ no route ─▶ dropped
//! ```

pub mod cache;
pub mod gated;
pub mod router;

pub use cache::FrameCache;
pub use gated::InterruptGated;
pub use router::{CanRouter, RouterStats};

/// Classic CAN payload limit.
pub const MAX_DATA_LEN: usize = 8;

/// One CAN 2.0 frame. Unused payload bytes are zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CanMessage {
    /// Bus identifier (11- or 29-bit).
    pub id: u32,
    pub data: [u8; MAX_DATA_LEN],
    /// Valid payload length (0..=8).
    pub len: u8,
}

impl CanMessage {
    /// Build a frame; payloads longer than eight bytes are truncated.
    pub fn new(id: u32, data: &[u8]) -> Self {
        let mut fixed = [0u8; MAX_DATA_LEN];
        let len = data.len().min(MAX_DATA_LEN);
        fixed[..len].copy_from_slice(&data[..len]);
        Self {
            id,
            data: fixed,
            len: len as u8,
        }
    }

    /// Valid payload bytes only.
    pub fn data_slice(&self) -> &[u8] {
        &self.data[..usize::from(self.len).min(MAX_DATA_LEN)]
    }
}
