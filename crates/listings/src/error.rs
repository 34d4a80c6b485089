use common::AggregateId;
use outbox::OutboxError;
use thiserror::Error;

/// Errors that can occur when changing listings.
#[derive(Debug, Error)]
pub enum ListingError {
    /// The request failed input validation.
    #[error("{0}")]
    Validation(String),

    /// A listing with this id already exists.
    #[error("Duplicate listing: {0}")]
    Duplicate(AggregateId),

    /// The listing row to update does not exist.
    #[error("Listing not found: {0}")]
    NotFound(AggregateId),

    /// Writing the outbox entry failed; the row change was not applied.
    #[error("Outbox error: {0}")]
    Outbox(#[from] OutboxError),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// An event payload could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ListingError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

/// Result type for listing operations.
pub type Result<T> = std::result::Result<T, ListingError>;
