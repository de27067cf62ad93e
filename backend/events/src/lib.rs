//! Event catalog, broadcast bus, and scope-filtered fan-out to subscribers.

pub mod bus;
pub mod connection;
pub mod emitter;
pub mod event;
pub mod subscriber;

pub use bus::EventBus;
pub use connection::{ClientCommand, EventConnection};
pub use emitter::Emitter;
pub use event::{Event, EventPayload, EventScope, CORE_SOURCE};
pub use subscriber::{DeliveryChannel, FrontendEvent, Subscriber};
