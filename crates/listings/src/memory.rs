use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::AggregateId;
use outbox::{InMemoryOutboxStore, OutboxEntry, OutboxStore};
use tokio::sync::RwLock;

use crate::{Listing, ListingError, ListingStore, Result};

/// In-memory listing store writing into a shared in-memory outbox.
///
/// The listing map stays write-locked while the outbox entry is enqueued,
/// and the row is only changed once the enqueue succeeded.
#[derive(Clone, Default)]
pub struct InMemoryListingStore {
    listings: Arc<RwLock<HashMap<AggregateId, Listing>>>,
    outbox: InMemoryOutboxStore,
}

impl InMemoryListingStore {
    pub fn new(outbox: InMemoryOutboxStore) -> Self {
        Self {
            listings: Arc::default(),
            outbox,
        }
    }

    /// The outbox this store writes into.
    pub fn outbox(&self) -> &InMemoryOutboxStore {
        &self.outbox
    }

    /// Number of rows, deleted ones included.
    pub async fn listing_count(&self) -> usize {
        self.listings.read().await.len()
    }
}

#[async_trait]
impl ListingStore for InMemoryListingStore {
    async fn insert(&self, listing: &Listing, entry: &OutboxEntry) -> Result<()> {
        let mut listings = self.listings.write().await;
        if listings.contains_key(&listing.id) {
            return Err(ListingError::Duplicate(listing.id));
        }

        self.outbox.enqueue(entry.clone()).await?;
        listings.insert(listing.id, listing.clone());
        Ok(())
    }

    async fn update(&self, listing: &Listing, entry: &OutboxEntry) -> Result<()> {
        let mut listings = self.listings.write().await;
        let Some(row) = listings.get_mut(&listing.id) else {
            return Err(ListingError::NotFound(listing.id));
        };

        self.outbox.enqueue(entry.clone()).await?;
        *row = listing.clone();
        Ok(())
    }

    async fn get(&self, id: AggregateId) -> Result<Option<Listing>> {
        Ok(self.listings.read().await.get(&id).cloned())
    }
}
