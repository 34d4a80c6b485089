//! Listing write side.
//!
//! Every create, update and soft delete writes the listing row and an
//! [`OutboxEntry`](outbox::OutboxEntry) for the matching event in one
//! atomic step, so the outbox publisher can relay the change later.

pub mod error;
pub mod listing;
pub mod memory;
pub mod postgres;
pub mod service;
pub mod store;

pub use error::{ListingError, Result};
pub use listing::{CreateListing, Listing, ListingInput};
pub use memory::InMemoryListingStore;
pub use postgres::PostgresListingStore;
pub use service::ListingService;
pub use store::ListingStore;
