//! Broker bridge between the outbox publisher and projection consumers.
//!
//! - [`EventPublisher`] publishes an [`Envelope`](common::Envelope) to a topic
//!   exchange, routed by its event type, and reports failure synchronously
//! - [`MessageSource`] declares durable queues, binds them by routing key and
//!   hands out [`Subscription`]s bounded by a prefetch count
//! - [`Delivery`] carries one message plus the ack/nack protocol
//! - [`InMemoryBroker`] implements both sides in process

pub mod bridge;
pub mod delivery;
pub mod error;
pub mod memory;
pub mod topic;

pub use bridge::{EventPublisher, MessageSource};
pub use delivery::{Acker, Delivery, Subscription};
pub use error::{BrokerError, Result};
pub use memory::InMemoryBroker;
