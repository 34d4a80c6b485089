use thiserror::Error;

use crate::OutboxEntryId;

/// Errors that can occur when reading or writing the outbox.
#[derive(Debug, Error)]
pub enum OutboxError {
    /// An entry with this id already exists.
    #[error("Duplicate outbox entry: {0}")]
    DuplicateEntry(OutboxEntryId),

    /// An outcome was recorded for an entry that does not exist.
    #[error("Outbox entry not found: {0}")]
    EntryNotFound(OutboxEntryId),

    /// A batch of publish outcomes failed validation before being written.
    #[error("Invalid publish outcome: {0}")]
    InvalidOutcome(String),

    /// The backing store refused the operation.
    #[error("Outbox store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A payload could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for outbox operations.
pub type Result<T> = std::result::Result<T, OutboxError>;
