//! Fuzz target: `CanRouter::handle`
//!
//! Replays arbitrary frames through a router with a handful of routes and
//! checks the drain bound and the received/routed/dropped bookkeeping.
//!
//! cargo fuzz run fuzz_can_router

#![no_main]

use std::cell::Cell;
use std::collections::VecDeque;

use libfuzzer_sys::fuzz_target;
use telemetry::Result;
use telemetry::app::ports::CanTransport;
use telemetry::can::{CanMessage, CanRouter};
use telemetry::error::Error;

struct Replay(VecDeque<CanMessage>);

impl CanTransport for Replay {
    fn begin(&mut self, _bitrate: u32) -> Result<()> {
        Ok(())
    }

    fn frame_available(&mut self) -> bool {
        !self.0.is_empty()
    }

    fn read_frame(&mut self) -> Result<CanMessage> {
        self.0.pop_front().ok_or(Error::TransportUnavailable)
    }

    fn send_frame(&mut self, _frame: &CanMessage) -> bool {
        true
    }
}

fuzz_target!(|data: &[u8]| {
    let Some((&budget, rest)) = data.split_first() else {
        return;
    };
    let max_per_tick = usize::from(budget % 16) + 1;

    // 1-byte id (low ids only, so routes get hit), 1-byte length, payload.
    let mut frames = VecDeque::new();
    let mut bytes = rest;
    while let [id, len, tail @ ..] = bytes {
        let n = usize::from(*len).min(tail.len());
        frames.push_back(CanMessage::new(u32::from(*id % 8), &tail[..n]));
        bytes = &tail[n..];
    }
    let total = frames.len();

    let hits = Cell::new(0u64);
    let mut router = CanRouter::new(Replay(frames), max_per_tick);
    for id in [0u32, 2, 4] {
        router
            .add_route(id, |m: &CanMessage| {
                assert!(m.data_slice().len() <= 8);
                hits.set(hits.get() + 1);
            })
            .expect("distinct ids");
    }

    let mut drained = 0;
    loop {
        let n = router.handle().expect("replay never fails");
        assert!(n <= max_per_tick);
        if n == 0 {
            break;
        }
        drained += n;
    }

    let stats = router.stats();
    assert_eq!(drained, total);
    assert_eq!(stats.received, total as u64);
    assert_eq!(stats.routed + stats.dropped, stats.received);
    assert_eq!(stats.routed, hits.get());
});
