//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing one structured line per
//! [`AppEvent`] to the `log` facade. On the host that ends up in the
//! `tracing-subscriber` formatter installed by the runner.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] and counts faults.
#[derive(Debug, Default)]
pub struct LogEventSink {
    faults: u32,
}

impl LogEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Faults seen since construction.
    pub fn faults(&self) -> u32 {
        self.faults
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started {
                sensors,
                slots,
                routes,
            } => {
                info!("START | sensors={} slots={} routes={}", sensors, slots, routes);
            }
            AppEvent::Fault { source, error } => {
                self.faults += 1;
                warn!("FAULT | {} | {}", source, error);
            }
            AppEvent::Published {
                entries,
                bytes,
                accepted,
                pending,
            } => {
                info!(
                    "PUBLISH | entries={} bytes={} accepted={} queue={}",
                    entries, bytes, accepted, pending
                );
            }
            AppEvent::Discarded { entries, bytes } => {
                info!("DISCARD | entries={} bytes={} (publishing disabled)", entries, bytes);
            }
            AppEvent::LoggingChanged(on) => {
                info!("LOGGING | {}", if *on { "ENABLED" } else { "DISABLED" });
            }
            AppEvent::PublishingChanged(on) => {
                info!("PUBLISHING | {}", if *on { "ENABLED" } else { "DISABLED" });
            }
            AppEvent::ClockSynced(secs) => {
                info!("CLOCK | synced to {}", secs);
            }
        }
    }
}
