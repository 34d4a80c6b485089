//! Search-side read model fed by the broker.
//!
//! - [`SearchIndex`] stores [`ListingSearchDocument`]s, in memory or in PostgreSQL
//! - [`ListingProjector`] applies listing events to the index idempotently
//! - [`ProjectionConsumer`] reads a durable queue, runs the projector and
//!   acknowledges, requeues or abandons each delivery

pub mod consumer;
pub mod document;
pub mod error;
pub mod index;
pub mod memory;
pub mod postgres;
pub mod projection;

pub use consumer::{AckDecision, ConsumerConfig, ProjectionConsumer, UnknownEventPolicy, decide};
pub use document::ListingSearchDocument;
pub use error::{ProjectionError, Result};
pub use index::SearchIndex;
pub use memory::InMemorySearchIndex;
pub use postgres::PostgresSearchIndex;
pub use projection::{ListingProjector, ProjectionOutcome, Projector};
