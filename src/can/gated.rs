//! Transport wrapper gated by the controller's interrupt line.
//!
//! Stand-alone CAN controllers (MCP2515 and friends) pull an active-low INT
//! pin while a received frame is waiting. Checking the pin first avoids a
//! bus transaction per tick when nothing arrived.

use embedded_hal::digital::InputPin;

use super::CanMessage;
use crate::app::ports::CanTransport;
use crate::error::Result;

pub struct InterruptGated<T, P> {
    inner: T,
    int_pin: P,
}

impl<T: CanTransport, P: InputPin> InterruptGated<T, P> {
    pub fn new(inner: T, int_pin: P) -> Self {
        Self { inner, int_pin }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    pub fn into_parts(self) -> (T, P) {
        (self.inner, self.int_pin)
    }
}

impl<T: CanTransport, P: InputPin> CanTransport for InterruptGated<T, P> {
    fn begin(&mut self, bitrate: u32) -> Result<()> {
        self.inner.begin(bitrate)
    }

    fn frame_available(&mut self) -> bool {
        // A pin read error falls back to asking the controller.
        self.int_pin.is_low().unwrap_or(true) && self.inner.frame_available()
    }

    fn read_frame(&mut self) -> Result<CanMessage> {
        self.inner.read_frame()
    }

    fn send_frame(&mut self, frame: &CanMessage) -> bool {
        self.inner.send_frame(frame)
    }
}
