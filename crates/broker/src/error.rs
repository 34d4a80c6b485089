use thiserror::Error;

/// Errors surfaced by the broker bridge.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The broker could not be reached or refused the operation.
    #[error("Broker unavailable: {0}")]
    Unavailable(String),

    /// The named queue has not been declared.
    #[error("Queue not found: {0}")]
    QueueNotFound(String),

    /// An ack or nack referenced a delivery the broker is not tracking.
    #[error("Unknown delivery tag: {0}")]
    UnknownDelivery(u64),

    /// The subscription or channel has been closed.
    #[error("Channel closed")]
    Closed,
}

/// Result type for broker operations.
pub type Result<T> = std::result::Result<T, BrokerError>;
