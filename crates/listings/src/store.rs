use std::sync::Arc;

use async_trait::async_trait;
use common::AggregateId;
use outbox::OutboxEntry;

use crate::{Listing, Result};

/// Persistence for listings.
///
/// Every mutation takes the outbox entry describing it; the row change and
/// the entry are committed together or not at all.
#[async_trait]
pub trait ListingStore: Send + Sync {
    /// Inserts a new listing row and its outbox entry.
    async fn insert(&self, listing: &Listing, entry: &OutboxEntry) -> Result<()>;

    /// Overwrites an existing listing row and appends its outbox entry.
    async fn update(&self, listing: &Listing, entry: &OutboxEntry) -> Result<()>;

    /// Loads a listing, including soft-deleted ones.
    async fn get(&self, id: AggregateId) -> Result<Option<Listing>>;
}

#[async_trait]
impl<T: ListingStore + ?Sized> ListingStore for Arc<T> {
    async fn insert(&self, listing: &Listing, entry: &OutboxEntry) -> Result<()> {
        (**self).insert(listing, entry).await
    }

    async fn update(&self, listing: &Listing, entry: &OutboxEntry) -> Result<()> {
        (**self).update(listing, entry).await
    }

    async fn get(&self, id: AggregateId) -> Result<Option<Listing>> {
        (**self).get(id).await
    }
}
