//! Shared contracts between the write side and the search projection.
//!
//! - [`AggregateId`] addresses both the listing row and its search document
//! - [`EventType`] names double as broker routing keys and dispatch discriminators
//! - [`Envelope`] is the wire form carried by the broker
//! - [`events`] holds the JSON payloads emitted for each listing change

pub mod envelope;
pub mod events;
pub mod types;

pub use envelope::Envelope;
pub use events::{EventType, ListingCreated, ListingDeleted, ListingUpdated, UnknownEventType};
pub use types::AggregateId;
