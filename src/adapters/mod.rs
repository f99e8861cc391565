//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter         | Implements        | Connects to                      |
//! |-----------------|-------------------|----------------------------------|
//! | `can_loopback`  | CanTransport      | In-memory bus (host / tests)     |
//! | `log_sink`      | EventSink         | `log` facade                     |
//! | `publish_queue` | PublishChannel    | Bounded RAM queue (host)         |
//! | `sim`           | GnssPort          | Simulated receiver               |
//! |                 | ThermocouplePort  | Simulated amplifier              |
//! | `time`          | TimePort          | `std::time` monotonic + wall     |

pub mod can_loopback;
pub mod log_sink;
pub mod publish_queue;
pub mod sim;
pub mod time;
