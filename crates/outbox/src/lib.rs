//! Transactional outbox for the listing write side.
//!
//! - [`OutboxEntry`] is written in the same local transaction as the business
//!   change that produced it
//! - [`OutboxStore`] reads pending entries and records publish outcomes
//!   ([`InMemoryOutboxStore`], [`PostgresOutboxStore`])
//! - [`OutboxPublisher`] drains pending entries into an
//!   [`EventPublisher`](broker::EventPublisher) with adaptive pacing and
//!   jittered exponential backoff ([`Pacer`], [`Backoff`])

pub mod entry;
pub mod error;
pub mod memory;
pub mod pacing;
pub mod postgres;
pub mod publisher;
pub mod store;

pub use entry::{OutboxEntry, OutboxEntryId, PendingEntry};
pub use error::{OutboxError, Result};
pub use memory::InMemoryOutboxStore;
pub use pacing::{Backoff, CycleOutcome, Pacer};
pub use postgres::PostgresOutboxStore;
pub use publisher::{CycleReport, OutboxPublisher, PublisherConfig};
pub use store::{OutboxStore, OutboxStoreExt};
