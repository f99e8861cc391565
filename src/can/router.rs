//! Identifier-keyed demultiplexer over a [`CanTransport`].
//!
//! Routes are registered before the tick loop starts and are unique per id.
//! [`CanRouter::handle`] polls the transport's level-triggered readiness,
//! never waits for a frame, and stops after `max_frames_per_tick` frames so
//! one tick stays bounded even under bus flooding.

use heapless::FnvIndexMap;
use log::{debug, info, warn};

use super::CanMessage;
use crate::app::ports::CanTransport;
use crate::error::{Error, Result};

/// Maximum number of routes (must be a power of two).
pub const MAX_ROUTES: usize = 16;

type Route<'a> = Box<dyn FnMut(&CanMessage) + 'a>;

/// Running counters for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterStats {
    pub received: u64,
    pub routed: u64,
    /// Frames with no registered route.
    pub dropped: u64,
    pub send_failures: u64,
}

pub struct CanRouter<'a, T> {
    transport: T,
    routes: FnvIndexMap<u32, Route<'a>, MAX_ROUTES>,
    max_frames_per_tick: usize,
    stats: RouterStats,
}

impl<'a, T: CanTransport> CanRouter<'a, T> {
    pub fn new(transport: T, max_frames_per_tick: usize) -> Self {
        Self {
            transport,
            routes: FnvIndexMap::new(),
            max_frames_per_tick: max_frames_per_tick.max(1),
            stats: RouterStats::default(),
        }
    }

    /// Bring up the transport.
    pub fn begin(&mut self, bitrate: u32) -> Result<()> {
        self.transport.begin(bitrate)?;
        info!("CanRouter: up at {} bit/s, {} routes", bitrate, self.routes.len());
        Ok(())
    }

    /// Register `handler` for frames with identifier `id`.
    ///
    /// A second registration for the same id fails with
    /// [`Error::DuplicateRoute`] and leaves the first handler in place.
    pub fn add_route<F>(&mut self, id: u32, handler: F) -> Result<()>
    where
        F: FnMut(&CanMessage) + 'a,
    {
        if self.routes.contains_key(&id) {
            warn!("CanRouter: id 0x{:X} already routed", id);
            return Err(Error::DuplicateRoute(id));
        }
        self.routes
            .insert(id, Box::new(handler))
            .map_err(|_| Error::Config("CAN route table full"))?;
        info!("CanRouter: route 0x{:X}", id);
        Ok(())
    }

    /// Drain pending frames and dispatch each to its route.
    ///
    /// Returns the number of frames read. Unrouted frames are counted and
    /// dropped. A failed read ends the drain with
    /// [`Error::TransportUnavailable`]; frames already routed stay routed.
    pub fn handle(&mut self) -> Result<usize> {
        let mut drained = 0;
        while drained < self.max_frames_per_tick && self.transport.frame_available() {
            let frame = self
                .transport
                .read_frame()
                .map_err(|_| Error::TransportUnavailable)?;
            drained += 1;
            self.stats.received += 1;

            match self.routes.get_mut(&frame.id) {
                Some(route) => {
                    route(&frame);
                    self.stats.routed += 1;
                }
                None => {
                    debug!("CanRouter: no route for 0x{:X}", frame.id);
                    self.stats.dropped += 1;
                }
            }
        }
        Ok(drained)
    }

    /// Hand one frame to the transport. No queuing or retry here.
    pub fn send(&mut self, message: &CanMessage) -> Result<()> {
        if self.transport.send_frame(message) {
            Ok(())
        } else {
            self.stats.send_failures += 1;
            Err(Error::TransportUnavailable)
        }
    }

    pub fn has_route(&self, id: u32) -> bool {
        self.routes.contains_key(&id)
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    pub fn stats(&self) -> RouterStats {
        self.stats
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}
