use std::sync::Arc;

use async_trait::async_trait;
use common::Envelope;

use crate::{Result, Subscription};

/// Producer side of the bridge.
///
/// `publish` returns only once the broker has accepted the message for
/// durable delivery; any error means the caller must treat the message as
/// not sent and retry it later.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publishes to the exchange using `envelope.event_type` as routing key.
    async fn publish(&self, envelope: &Envelope) -> Result<()>;
}

/// Consumer side of the bridge.
///
/// Several queues may bind the same routing key; each receives its own copy,
/// so independent projector families never coordinate.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Declares a durable queue. Declaring an existing queue is a no-op.
    async fn declare_queue(&self, queue: &str) -> Result<()>;

    /// Routes messages whose routing key matches `binding_key` into `queue`.
    async fn bind_queue(&self, queue: &str, binding_key: &str) -> Result<()>;

    /// Starts consuming `queue` with manual acknowledgement. At most
    /// `prefetch` deliveries are outstanding (unsettled) at any time.
    async fn subscribe(&self, queue: &str, prefetch: usize) -> Result<Subscription>;
}

#[async_trait]
impl<T: EventPublisher + ?Sized> EventPublisher for Arc<T> {
    async fn publish(&self, envelope: &Envelope) -> Result<()> {
        (**self).publish(envelope).await
    }
}

#[async_trait]
impl<T: MessageSource + ?Sized> MessageSource for Arc<T> {
    async fn declare_queue(&self, queue: &str) -> Result<()> {
        (**self).declare_queue(queue).await
    }

    async fn bind_queue(&self, queue: &str, binding_key: &str) -> Result<()> {
        (**self).bind_queue(queue, binding_key).await
    }

    async fn subscribe(&self, queue: &str, prefetch: usize) -> Result<Subscription> {
        (**self).subscribe(queue, prefetch).await
    }
}
