//! Loopback CAN transport for host runs and tests.
//!
//! Frames are injected into a bounded receive queue by the caller (or by
//! the simulated bus). Transmitted frames are kept in a short history and,
//! with echo enabled, fed back into the receive queue.

use heapless::Deque;
use log::{debug, info};

use crate::app::ports::CanTransport;
use crate::can::CanMessage;
use crate::error::{Error, Result};

/// Receive queue depth, matching a small controller FIFO plus driver ring.
pub const RX_DEPTH: usize = 64;
/// Transmit history kept for inspection.
pub const TX_HISTORY: usize = 16;

#[derive(Debug, Default)]
pub struct LoopbackCan {
    bitrate: Option<u32>,
    echo: bool,
    rx: Deque<CanMessage, RX_DEPTH>,
    sent: Deque<CanMessage, TX_HISTORY>,
    rx_overruns: u64,
}

impl LoopbackCan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed transmitted frames back into the receive queue.
    pub fn with_echo(mut self) -> Self {
        self.echo = true;
        self
    }

    /// Queue a frame as if it arrived from the bus. Returns `false` on overrun.
    pub fn inject(&mut self, frame: CanMessage) -> bool {
        if self.rx.push_back(frame).is_err() {
            self.rx_overruns += 1;
            debug!("LoopbackCan: rx overrun, 0x{:X} lost", frame.id);
            return false;
        }
        true
    }

    /// Most recent transmitted frames, oldest first.
    pub fn sent(&self) -> impl Iterator<Item = &CanMessage> {
        self.sent.iter()
    }

    pub fn rx_overruns(&self) -> u64 {
        self.rx_overruns
    }

    pub fn bitrate(&self) -> Option<u32> {
        self.bitrate
    }
}

impl CanTransport for LoopbackCan {
    fn begin(&mut self, bitrate: u32) -> Result<()> {
        if bitrate == 0 {
            return Err(Error::Init("CAN bitrate must be non-zero"));
        }
        self.bitrate = Some(bitrate);
        info!("LoopbackCan: started at {} bit/s", bitrate);
        Ok(())
    }

    fn frame_available(&mut self) -> bool {
        self.bitrate.is_some() && !self.rx.is_empty()
    }

    fn read_frame(&mut self) -> Result<CanMessage> {
        self.rx.pop_front().ok_or(Error::TransportUnavailable)
    }

    fn send_frame(&mut self, frame: &CanMessage) -> bool {
        if self.bitrate.is_none() {
            return false;
        }
        if self.sent.is_full() {
            self.sent.pop_front();
        }
        // Cannot fail: a slot was freed above.
        let _ = self.sent.push_back(*frame);
        if self.echo {
            self.inject(*frame);
        }
        true
    }
}
