use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use common::EventType;
use serde::Serialize;

use crate::{OutboxEntry, OutboxEntryId, OutboxError, PendingEntry, Result};

/// Durable storage for outbox entries.
///
/// Only the outbox publisher mutates stored entries, and only through
/// [`save_outcomes`](OutboxStore::save_outcomes). Entries are never deleted.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Appends a pending entry outside of any caller transaction.
    async fn enqueue(&self, entry: OutboxEntry) -> Result<()>;

    /// Returns up to `limit` pending entries, oldest `occurred_at` first.
    async fn fetch_pending(&self, limit: usize) -> Result<Vec<OutboxEntry>>;

    /// Persists the publish outcome (`published_at`, `attempts`,
    /// `last_error`) of every entry in one atomic write. A stored attempt
    /// count is never lowered.
    async fn save_outcomes(&self, entries: &[OutboxEntry]) -> Result<()>;

    /// Looks up a single entry.
    async fn get(&self, id: OutboxEntryId) -> Result<Option<OutboxEntry>>;
}

/// Convenience methods for outbox stores.
#[async_trait]
pub trait OutboxStoreExt: OutboxStore {
    /// JSON-encodes `event` and enqueues it.
    async fn enqueue_event<E: Serialize + Sync>(
        &self,
        event_type: EventType,
        event: &E,
    ) -> Result<OutboxEntryId> {
        let entry = OutboxEntry::for_event(event_type, event)?;
        let id = entry.id;
        self.enqueue(entry).await?;
        Ok(id)
    }

    /// Diagnostic listing of the oldest pending entries.
    async fn pending_summary(&self, limit: usize) -> Result<Vec<PendingEntry>> {
        let pending = self.fetch_pending(limit).await?;
        Ok(pending.iter().map(OutboxEntry::summary).collect())
    }
}

impl<T: OutboxStore + ?Sized> OutboxStoreExt for T {}

#[async_trait]
impl<T: OutboxStore + ?Sized> OutboxStore for Arc<T> {
    async fn enqueue(&self, entry: OutboxEntry) -> Result<()> {
        (**self).enqueue(entry).await
    }

    async fn fetch_pending(&self, limit: usize) -> Result<Vec<OutboxEntry>> {
        (**self).fetch_pending(limit).await
    }

    async fn save_outcomes(&self, entries: &[OutboxEntry]) -> Result<()> {
        (**self).save_outcomes(entries).await
    }

    async fn get(&self, id: OutboxEntryId) -> Result<Option<OutboxEntry>> {
        (**self).get(id).await
    }
}

/// Validates a batch of outcomes before it is written.
pub fn validate_outcomes(entries: &[OutboxEntry]) -> Result<()> {
    let mut seen = HashSet::with_capacity(entries.len());

    for entry in entries {
        if !seen.insert(entry.id) {
            return Err(OutboxError::InvalidOutcome(format!(
                "entry {} appears twice in one batch",
                entry.id
            )));
        }
        if entry.attempts < 1 {
            return Err(OutboxError::InvalidOutcome(format!(
                "entry {} has no recorded attempt",
                entry.id
            )));
        }
        if entry.published_at.is_some() && entry.last_error.is_some() {
            return Err(OutboxError::InvalidOutcome(format!(
                "entry {} is published but still carries an error",
                entry.id
            )));
        }
    }

    Ok(())
}
