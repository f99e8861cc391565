//! Fuzz target: `EventBuffer::add`
//!
//! Splits the input into tag/value pairs and appends them to a small batch.
//! The tracked size must always match the finalized payload and stay within
//! capacity, and a refused add (overflow or non-finite float) must leave the
//! batch untouched.
//!
//! cargo fuzz run fuzz_event_buffer

#![no_main]

use libfuzzer_sys::fuzz_target;
use telemetry::app::ports::PublishChannel;
use telemetry::error::Error;
use telemetry::event_buffer::{DeliveryFlags, EventBuffer, Value};

struct Discard;

impl PublishChannel for Discard {
    fn configure(&mut self, _ram_capacity: usize, _storage_path: &str) {}

    fn publish(&mut self, _name: &str, _payload: &str, _flags: DeliveryFlags) -> bool {
        true
    }

    fn tick(&mut self) {}

    fn pending_count(&self) -> usize {
        0
    }
}

fuzz_target!(|data: &[u8]| {
    let Some((&cap, rest)) = data.split_first() else {
        return;
    };
    let capacity = 64 + usize::from(cap) * 4;
    let Ok(mut buffer) =
        EventBuffer::new(Discard, capacity, 1, "/q", DeliveryFlags::PRIVATE_WITH_ACK, 0)
    else {
        return;
    };

    for chunk in rest.chunks(9) {
        let (kind, body) = chunk.split_first().unwrap_or((&0, &[]));
        let tag = String::from_utf8_lossy(&body[..body.len().min(4)]).into_owned();
        let value = match kind % 3 {
            0 => Value::Int(body.iter().fold(0i64, |acc, &b| (acc << 8) | i64::from(b))),
            1 => {
                let mut raw = [0u8; 8];
                raw[..body.len().min(8)].copy_from_slice(&body[..body.len().min(8)]);
                Value::Float(f64::from_le_bytes(raw))
            }
            _ => Value::Text(String::from_utf8_lossy(body).into_owned()),
        };

        let before = buffer.batch().clone();
        match buffer.add(&tag, value) {
            Ok(()) => {}
            Err(Error::Overflow { .. } | Error::Encode) => assert_eq!(buffer.batch(), &before),
            Err(e) => panic!("unexpected error {e:?}"),
        }
        let payload = buffer.finalize().expect("finalize");
        assert_eq!(payload.len(), buffer.batch().bytes());
        assert!(payload.len() <= capacity);
    }

    assert!(buffer.publish("fuzz", 1).is_ok());
    assert!(buffer.batch().is_empty());
});
