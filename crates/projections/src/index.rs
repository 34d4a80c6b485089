use std::sync::Arc;

use async_trait::async_trait;
use common::AggregateId;

use crate::{ListingSearchDocument, Result};

/// Document store the projector writes into.
///
/// Every operation is idempotent: repeating an upsert leaves the same
/// document, and deleting a missing id succeeds.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Creates the index if it does not exist yet.
    async fn ensure_index(&self) -> Result<()>;

    /// Inserts or fully replaces the document with the same id.
    async fn upsert(&self, document: &ListingSearchDocument) -> Result<()>;

    /// Removes the document. Returns whether it existed.
    async fn delete(&self, id: AggregateId) -> Result<bool>;

    async fn get(&self, id: AggregateId) -> Result<Option<ListingSearchDocument>>;

    /// Number of indexed documents.
    async fn count(&self) -> Result<usize>;
}

#[async_trait]
impl<T: SearchIndex + ?Sized> SearchIndex for Arc<T> {
    async fn ensure_index(&self) -> Result<()> {
        (**self).ensure_index().await
    }

    async fn upsert(&self, document: &ListingSearchDocument) -> Result<()> {
        (**self).upsert(document).await
    }

    async fn delete(&self, id: AggregateId) -> Result<bool> {
        (**self).delete(id).await
    }

    async fn get(&self, id: AggregateId) -> Result<Option<ListingSearchDocument>> {
        (**self).get(id).await
    }

    async fn count(&self) -> Result<usize> {
        (**self).count().await
    }
}
