//! Broker-fed consumer that drives a [`Projector`] and settles deliveries.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use broker::{Delivery, MessageSource};
use common::EventType;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::{ProjectionError, ProjectionOutcome, Projector, Result};

/// What to do with deliveries whose event type the projector does not know.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnknownEventPolicy {
    /// Acknowledge and drop. Newer producers can add event types without
    /// wedging older consumers.
    #[default]
    AckAndDrop,
    /// Treat as a processing failure and ask for redelivery.
    Reject,
}

impl FromStr for UnknownEventPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ack" | "ack_and_drop" | "drop" => Ok(Self::AckAndDrop),
            "reject" | "requeue" => Ok(Self::Reject),
            other => Err(format!("unknown event policy: {other}")),
        }
    }
}

/// How a delivery is settled with the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckDecision {
    /// Remove from the queue.
    Ack,
    /// `nack` with requeue so the broker redelivers it.
    Requeue,
    /// Leave unsettled; the broker returns it once the subscription closes.
    Abandon,
}

/// Maps a projection result to an ack decision.
///
/// Failures observed while shutting down, and applies cut short by
/// shutdown, are abandoned rather than requeued, so a stopping consumer
/// does not spin on redeliveries and the message is not discarded either.
pub fn decide(
    result: &Result<ProjectionOutcome>,
    policy: UnknownEventPolicy,
    shutting_down: bool,
) -> AckDecision {
    match result {
        Ok(_) => AckDecision::Ack,
        Err(ProjectionError::UnknownEventType(_)) if policy == UnknownEventPolicy::AckAndDrop => {
            AckDecision::Ack
        }
        Err(ProjectionError::Interrupted) => AckDecision::Abandon,
        Err(_) if shutting_down => AckDecision::Abandon,
        Err(_) => AckDecision::Requeue,
    }
}

/// Consumer settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerConfig {
    /// Durable queue this consumer family reads.
    pub queue: String,
    /// Maximum deliveries in flight at once.
    pub prefetch: usize,
    pub unknown_event_policy: UnknownEventPolicy,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            queue: "search.listings".to_string(),
            prefetch: 10,
            unknown_event_policy: UnknownEventPolicy::default(),
        }
    }
}

/// Reads deliveries from a queue, applies them through a projector and
/// acknowledges each one according to [`decide`].
///
/// Up to `prefetch` deliveries are processed concurrently. On shutdown the
/// consumer stops taking new deliveries, interrupts in-flight applies,
/// settles them and then closes its subscription.
pub struct ProjectionConsumer<M, P> {
    source: M,
    projector: Arc<P>,
    config: ConsumerConfig,
}

impl<M, P> ProjectionConsumer<M, P>
where
    M: MessageSource,
    P: Projector + 'static,
{
    pub fn new(source: M, projector: P, config: ConsumerConfig) -> Self {
        Self {
            source,
            projector: Arc::new(projector),
            config,
        }
    }

    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    /// Declares the queue and binds it to every known event type.
    pub async fn setup(&self) -> Result<()> {
        self.source.declare_queue(&self.config.queue).await?;
        for event_type in EventType::ALL {
            self.source
                .bind_queue(&self.config.queue, event_type.as_str())
                .await?;
        }
        Ok(())
    }

    /// Applies and settles a single delivery.
    pub async fn process(&self, delivery: Delivery, shutdown: &CancellationToken) -> AckDecision {
        process_delivery(
            self.projector.as_ref(),
            self.config.unknown_event_policy,
            delivery,
            shutdown,
        )
        .await
    }

    /// Consumes until `shutdown` is cancelled or the subscription ends.
    #[tracing::instrument(skip(self, shutdown), fields(queue = %self.config.queue, projector = self.projector.name()))]
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        self.setup().await?;
        let prefetch = self.config.prefetch.max(1);
        let mut subscription = self.source.subscribe(&self.config.queue, prefetch).await?;
        tracing::info!(prefetch, "projection consumer started");

        let mut in_flight: JoinSet<AckDecision> = JoinSet::new();

        loop {
            while let Some(joined) = in_flight.try_join_next() {
                log_join(joined);
            }

            if in_flight.len() >= prefetch {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    Some(joined) = in_flight.join_next() => {
                        log_join(joined);
                        continue;
                    }
                }
            }

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                delivery = subscription.recv() => {
                    let Some(delivery) = delivery else {
                        tracing::warn!("subscription closed by broker");
                        break;
                    };
                    let projector = self.projector.clone();
                    let policy = self.config.unknown_event_policy;
                    let token = shutdown.clone();
                    in_flight.spawn(async move {
                        process_delivery(projector.as_ref(), policy, delivery, &token).await
                    });
                }
            }
        }

        let draining = in_flight.len();
        while let Some(joined) = in_flight.join_next().await {
            log_join(joined);
        }
        drop(subscription);

        tracing::info!(drained = draining, "projection consumer stopped");
        Ok(())
    }
}

async fn process_delivery<P: Projector + ?Sized>(
    projector: &P,
    policy: UnknownEventPolicy,
    delivery: Delivery,
    shutdown: &CancellationToken,
) -> AckDecision {
    let started = Instant::now();
    let result = tokio::select! {
        biased;
        result = projector.apply(&delivery.envelope) => result,
        _ = shutdown.cancelled() => Err(ProjectionError::Interrupted),
    };
    metrics::histogram!("projection_apply_duration_seconds").record(started.elapsed().as_secs_f64());

    let decision = decide(&result, policy, shutdown.is_cancelled());
    let tag = delivery.delivery_tag;
    let event_type = delivery.envelope.event_type.clone();

    let outcome = match (&result, decision) {
        (Ok(ProjectionOutcome::Upserted), _) => "upserted",
        (Ok(ProjectionOutcome::Deleted { .. }), _) => "deleted",
        (Err(_), AckDecision::Ack) => "dropped",
        (Err(_), AckDecision::Requeue) => "requeued",
        (Err(_), AckDecision::Abandon) => "abandoned",
    };
    metrics::counter!("projection_messages_total", "outcome" => outcome).increment(1);

    match &result {
        Ok(applied) => {
            tracing::debug!(delivery_tag = tag, event_type = %event_type, outcome = ?applied, "projected");
        }
        Err(ProjectionError::UnknownEventType(_)) if decision == AckDecision::Ack => {
            tracing::warn!(delivery_tag = tag, event_type = %event_type, "unknown event type, dropped");
        }
        Err(e) => {
            tracing::error!(
                delivery_tag = tag,
                event_type = %event_type,
                redelivered = delivery.redelivered,
                decision = ?decision,
                error = %e,
                "projection failed"
            );
        }
    }

    let settled = match decision {
        AckDecision::Ack => delivery.ack().await,
        AckDecision::Requeue => delivery.nack(true).await,
        AckDecision::Abandon => {
            delivery.abandon();
            Ok(())
        }
    };
    if let Err(e) = settled {
        tracing::error!(delivery_tag = tag, error = %e, "failed to settle delivery");
    }

    decision
}

fn log_join(joined: std::result::Result<AckDecision, tokio::task::JoinError>) {
    if let Err(e) = joined {
        tracing::error!(error = %e, "projection task panicked");
    }
}
