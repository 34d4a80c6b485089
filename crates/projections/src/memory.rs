use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::AggregateId;
use tokio::sync::RwLock;

use crate::{ListingSearchDocument, ProjectionError, Result, SearchIndex};

/// In-memory search index for tests and single-process runs.
#[derive(Clone)]
pub struct InMemorySearchIndex {
    documents: Arc<RwLock<HashMap<AggregateId, ListingSearchDocument>>>,
    created: Arc<AtomicBool>,
    available: Arc<AtomicBool>,
}

impl InMemorySearchIndex {
    /// Creates a new empty index.
    pub fn new() -> Self {
        Self {
            documents: Arc::default(),
            created: Arc::new(AtomicBool::new(false)),
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    /// While unavailable every operation fails with
    /// [`ProjectionError::IndexUnavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Whether [`ensure_index`](SearchIndex::ensure_index) has run.
    pub fn is_created(&self) -> bool {
        self.created.load(Ordering::SeqCst)
    }

    /// Snapshot of every document.
    pub async fn documents(&self) -> Vec<ListingSearchDocument> {
        self.documents.read().await.values().cloned().collect()
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ProjectionError::IndexUnavailable(
                "in-memory index is offline".to_string(),
            ))
        }
    }
}

impl Default for InMemorySearchIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchIndex for InMemorySearchIndex {
    async fn ensure_index(&self) -> Result<()> {
        self.check_available()?;
        self.created.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn upsert(&self, document: &ListingSearchDocument) -> Result<()> {
        self.check_available()?;
        self.documents
            .write()
            .await
            .insert(document.id, document.clone());
        Ok(())
    }

    async fn delete(&self, id: AggregateId) -> Result<bool> {
        self.check_available()?;
        Ok(self.documents.write().await.remove(&id).is_some())
    }

    async fn get(&self, id: AggregateId) -> Result<Option<ListingSearchDocument>> {
        self.check_available()?;
        Ok(self.documents.read().await.get(&id).cloned())
    }

    async fn count(&self) -> Result<usize> {
        self.check_available()?;
        Ok(self.documents.read().await.len())
    }
}
