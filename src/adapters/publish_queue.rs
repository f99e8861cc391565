//! In-memory publish queue.
//!
//! Stands in for the device's persistent at-least-once queue on the host.
//! Payloads wait in a bounded RAM queue and one is delivered per
//! [`tick`](PublishChannel::tick) while the link is up, so a stalled link
//! shows up as a growing `pending_count`.

use std::collections::VecDeque;

use log::{debug, info, warn};

use crate::app::ports::PublishChannel;
use crate::event_buffer::DeliveryFlags;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedEvent {
    pub name: String,
    pub payload: String,
    pub flags: DeliveryFlags,
}

#[derive(Debug)]
pub struct MemoryPublishQueue {
    ram_capacity: usize,
    storage_path: String,
    queue: VecDeque<QueuedEvent>,
    online: bool,
    delivered: u64,
    last_delivered: Option<QueuedEvent>,
}

impl Default for MemoryPublishQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPublishQueue {
    /// Online queue; capacity is set by `configure`.
    pub fn new() -> Self {
        Self {
            ram_capacity: 1,
            storage_path: String::new(),
            queue: VecDeque::new(),
            online: true,
            delivered: 0,
            last_delivered: None,
        }
    }

    /// Simulate the cloud link going up or down.
    pub fn set_online(&mut self, online: bool) {
        if online != self.online {
            info!("PublishQueue: link {}", if online { "up" } else { "down" });
        }
        self.online = online;
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    pub fn last_delivered(&self) -> Option<&QueuedEvent> {
        self.last_delivered.as_ref()
    }

    pub fn storage_path(&self) -> &str {
        &self.storage_path
    }

    pub fn ram_capacity(&self) -> usize {
        self.ram_capacity
    }
}

impl PublishChannel for MemoryPublishQueue {
    fn configure(&mut self, ram_capacity: usize, storage_path: &str) {
        self.ram_capacity = ram_capacity.max(1);
        self.storage_path = storage_path.to_owned();
        info!(
            "PublishQueue: {} RAM slots, storage '{}'",
            self.ram_capacity, self.storage_path
        );
    }

    fn publish(&mut self, name: &str, payload: &str, flags: DeliveryFlags) -> bool {
        if self.queue.len() >= self.ram_capacity {
            warn!("PublishQueue: full ({} events), '{}' refused", self.queue.len(), name);
            return false;
        }
        self.queue.push_back(QueuedEvent {
            name: name.to_owned(),
            payload: payload.to_owned(),
            flags,
        });
        true
    }

    fn tick(&mut self) {
        if !self.online {
            return;
        }
        if let Some(event) = self.queue.pop_front() {
            self.delivered += 1;
            debug!("PublishQueue: delivered '{}' ({}B)", event.name, event.payload.len());
            self.last_delivered = Some(event);
        }
    }

    fn pending_count(&self) -> usize {
        self.queue.len()
    }
}
