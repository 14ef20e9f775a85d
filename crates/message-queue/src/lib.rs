//! # Message Queue
//!
//! Publish/subscribe adapters for the Lookout control plane and event stream.
//! [`MessageBus`] is the seam; [`InMemoryBus`] serves embedded setups and
//! tests, [`NatsBus`] talks to a NATS server.

pub use lookout_core;

mod bus;
mod error;
mod memory;
mod nats;
mod sink;

pub use bus::{new_inbox, publish_json, Message, MessageBus, Subscription};
pub use error::BusError;
pub use memory::InMemoryBus;
pub use nats::NatsBus;
pub use sink::BusEventSink;
