use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use common::Envelope;
use futures_core::Stream;
use tokio::sync::mpsc;

use crate::Result;

/// Settles deliveries on behalf of a subscription.
#[async_trait]
pub trait Acker: Send + Sync {
    /// Removes the delivery from the queue.
    async fn ack(&self, delivery_tag: u64) -> Result<()>;

    /// Rejects the delivery. With `requeue` the broker redelivers it,
    /// otherwise it is discarded.
    async fn nack(&self, delivery_tag: u64, requeue: bool) -> Result<()>;
}

/// A message handed to a consumer and not yet settled.
///
/// `ack` and `nack` consume the delivery, so it can be settled at most once.
/// Dropping it unsettled leaves the message unacknowledged; the broker hands
/// it out again after the owning subscription closes.
pub struct Delivery {
    pub delivery_tag: u64,
    pub envelope: Envelope,
    /// Set when this message was handed out before and not acknowledged.
    pub redelivered: bool,
    acker: Arc<dyn Acker>,
}

impl Delivery {
    pub fn new(
        delivery_tag: u64,
        envelope: Envelope,
        redelivered: bool,
        acker: Arc<dyn Acker>,
    ) -> Self {
        Self {
            delivery_tag,
            envelope,
            redelivered,
            acker,
        }
    }

    pub async fn ack(self) -> Result<()> {
        self.acker.ack(self.delivery_tag).await
    }

    pub async fn nack(self, requeue: bool) -> Result<()> {
        self.acker.nack(self.delivery_tag, requeue).await
    }

    /// Gives up on the delivery without settling it.
    pub fn abandon(self) {
        tracing::debug!(delivery_tag = self.delivery_tag, "delivery left unacknowledged");
    }
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("delivery_tag", &self.delivery_tag)
            .field("event_type", &self.envelope.event_type)
            .field("redelivered", &self.redelivered)
            .finish()
    }
}

/// Stream of deliveries for one consumer. Dropping it closes the consumer.
pub struct Subscription {
    receiver: mpsc::Receiver<Delivery>,
}

impl Subscription {
    pub fn new(receiver: mpsc::Receiver<Delivery>) -> Self {
        Self { receiver }
    }

    /// Waits for the next delivery. Returns `None` once the broker side closes.
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.receiver.recv().await
    }
}

impl Stream for Subscription {
    type Item = Delivery;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}
