//! Projection error types.

use thiserror::Error;

/// Errors that can occur while projecting events into the search index.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// The envelope carries an event type this projector does not handle.
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    /// The payload decoded but does not describe a usable document.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Failed to deserialize an event payload.
    #[error("Event deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// The search index refused the operation.
    #[error("Search index unavailable: {0}")]
    IndexUnavailable(String),

    /// A database error occurred in the search index.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Shutdown fired before the projector finished.
    #[error("Projection interrupted by shutdown")]
    Interrupted,

    /// Declaring, binding or subscribing to the queue failed.
    #[error("Broker error: {0}")]
    Broker(#[from] broker::BrokerError),
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
