use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    OutboxEntry, OutboxEntryId, OutboxError, Result,
    store::{OutboxStore, validate_outcomes},
};

/// In-memory outbox store for tests and local runs.
///
/// Clones share the same entries, so a business store and the publisher can
/// hold separate handles onto one outbox.
#[derive(Clone, Default)]
pub struct InMemoryOutboxStore {
    entries: Arc<RwLock<Vec<OutboxEntry>>>,
    failing: Arc<AtomicBool>,
}

impl InMemoryOutboxStore {
    /// Creates a new empty in-memory outbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// While failing, every write returns [`OutboxError::Unavailable`].
    /// Reads keep working.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Returns the total number of entries, published or not.
    pub async fn entry_count(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn pending_count(&self) -> usize {
        self.entries
            .read()
            .await
            .iter()
            .filter(|e| e.is_pending())
            .count()
    }

    /// Snapshot of every entry in insertion order.
    pub async fn all_entries(&self) -> Vec<OutboxEntry> {
        self.entries.read().await.clone()
    }

    fn check_writable(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(OutboxError::Unavailable(
                "in-memory outbox is failing writes".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl OutboxStore for InMemoryOutboxStore {
    async fn enqueue(&self, entry: OutboxEntry) -> Result<()> {
        self.check_writable()?;

        let mut entries = self.entries.write().await;
        if entries.iter().any(|e| e.id == entry.id) {
            return Err(OutboxError::DuplicateEntry(entry.id));
        }
        entries.push(entry);
        Ok(())
    }

    async fn fetch_pending(&self, limit: usize) -> Result<Vec<OutboxEntry>> {
        let entries = self.entries.read().await;
        let mut pending: Vec<_> = entries.iter().filter(|e| e.is_pending()).cloned().collect();
        // Stable sort keeps insertion order for equal timestamps.
        pending.sort_by_key(|e| e.occurred_at);
        pending.truncate(limit);
        Ok(pending)
    }

    async fn save_outcomes(&self, outcomes: &[OutboxEntry]) -> Result<()> {
        self.check_writable()?;
        validate_outcomes(outcomes)?;

        let mut entries = self.entries.write().await;

        // All or nothing: resolve every position before mutating.
        let mut positions = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            let position = entries
                .iter()
                .position(|e| e.id == outcome.id)
                .ok_or(OutboxError::EntryNotFound(outcome.id))?;
            positions.push(position);
        }

        for (position, outcome) in positions.into_iter().zip(outcomes) {
            let stored = &mut entries[position];
            stored.published_at = outcome.published_at;
            stored.attempts = stored.attempts.max(outcome.attempts);
            stored.last_error = outcome.last_error.clone();
        }

        Ok(())
    }

    async fn get(&self, id: OutboxEntryId) -> Result<Option<OutboxEntry>> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .find(|e| e.id == id)
            .cloned())
    }
}
