use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use common::Envelope;
use tokio::sync::{Mutex, Notify, mpsc};

use crate::{
    Acker, BrokerError, Delivery, EventPublisher, MessageSource, Result, Subscription, topic,
};

#[derive(Debug, Clone)]
struct Message {
    envelope: Envelope,
    redelivered: bool,
}

struct Unacked {
    subscriber: u64,
    message: Message,
}

#[derive(Default)]
struct Queue {
    ready: VecDeque<Message>,
    unacked: HashMap<u64, Unacked>,
    subscribers: HashMap<u64, Arc<Notify>>,
}

impl Queue {
    fn outstanding(&self, subscriber: u64) -> usize {
        self.unacked
            .values()
            .filter(|u| u.subscriber == subscriber)
            .count()
    }

    fn wake_all(&self) {
        for notify in self.subscribers.values() {
            notify.notify_one();
        }
    }
}

struct Binding {
    queue: String,
    pattern: String,
}

struct BrokerState {
    queues: HashMap<String, Queue>,
    bindings: Vec<Binding>,
    available: bool,
    next_delivery_tag: u64,
    next_subscriber: u64,
    discarded: u64,
}

impl Default for BrokerState {
    fn default() -> Self {
        Self {
            queues: HashMap::new(),
            bindings: Vec::new(),
            available: true,
            next_delivery_tag: 1,
            next_subscriber: 1,
            discarded: 0,
        }
    }
}

/// In-process topic exchange with durable named queues.
///
/// Behaves like a single AMQP topic exchange: every queue whose binding
/// matches the routing key receives its own copy, messages matching no
/// binding are dropped, and each subscription holds at most `prefetch`
/// unsettled deliveries. Queues outlive their subscriptions, so messages
/// published while nobody consumes are kept until a consumer attaches.
#[derive(Clone)]
pub struct InMemoryBroker {
    exchange: Arc<str>,
    state: Arc<Mutex<BrokerState>>,
}

impl InMemoryBroker {
    /// Creates a broker exposing a single topic exchange.
    pub fn new(exchange: impl Into<String>) -> Self {
        Self {
            exchange: Arc::from(exchange.into()),
            state: Arc::new(Mutex::new(BrokerState::default())),
        }
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    /// Simulates an outage: while unavailable every publish fails.
    pub async fn set_available(&self, available: bool) {
        self.state.lock().await.available = available;
    }

    /// Messages waiting in `queue` that have not been handed out.
    pub async fn ready_count(&self, queue: &str) -> usize {
        self.state
            .lock()
            .await
            .queues
            .get(queue)
            .map(|q| q.ready.len())
            .unwrap_or(0)
    }

    /// Messages handed out from `queue` and not yet settled.
    pub async fn unacked_count(&self, queue: &str) -> usize {
        self.state
            .lock()
            .await
            .queues
            .get(queue)
            .map(|q| q.unacked.len())
            .unwrap_or(0)
    }

    /// Messages dropped by `nack` without requeue.
    pub async fn discarded_count(&self) -> u64 {
        self.state.lock().await.discarded
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new("listing.events")
    }
}

#[async_trait]
impl EventPublisher for InMemoryBroker {
    async fn publish(&self, envelope: &Envelope) -> Result<()> {
        let mut state = self.state.lock().await;

        if !state.available {
            metrics::counter!("broker_publish_rejected_total").increment(1);
            return Err(BrokerError::Unavailable(format!(
                "exchange {} is not accepting messages",
                self.exchange
            )));
        }

        let mut targets: Vec<String> = Vec::new();
        for binding in &state.bindings {
            if topic::matches(&binding.pattern, &envelope.event_type)
                && !targets.contains(&binding.queue)
            {
                targets.push(binding.queue.clone());
            }
        }

        if targets.is_empty() {
            tracing::debug!(
                exchange = %self.exchange,
                routing_key = %envelope.event_type,
                "no queue bound for routing key, message dropped"
            );
        }

        for name in targets {
            if let Some(queue) = state.queues.get_mut(&name) {
                queue.ready.push_back(Message {
                    envelope: envelope.clone(),
                    redelivered: false,
                });
                queue.wake_all();
            }
        }

        metrics::counter!("broker_messages_published_total").increment(1);
        Ok(())
    }
}

#[async_trait]
impl MessageSource for InMemoryBroker {
    async fn declare_queue(&self, queue: &str) -> Result<()> {
        self.state
            .lock()
            .await
            .queues
            .entry(queue.to_string())
            .or_default();
        Ok(())
    }

    async fn bind_queue(&self, queue: &str, binding_key: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.queues.contains_key(queue) {
            return Err(BrokerError::QueueNotFound(queue.to_string()));
        }

        let exists = state
            .bindings
            .iter()
            .any(|b| b.queue == queue && b.pattern == binding_key);
        if !exists {
            state.bindings.push(Binding {
                queue: queue.to_string(),
                pattern: binding_key.to_string(),
            });
        }
        Ok(())
    }

    async fn subscribe(&self, queue: &str, prefetch: usize) -> Result<Subscription> {
        let prefetch = prefetch.max(1);

        let (subscriber, notify) = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            let queue_state = state
                .queues
                .get_mut(queue)
                .ok_or_else(|| BrokerError::QueueNotFound(queue.to_string()))?;

            let subscriber = state.next_subscriber;
            state.next_subscriber += 1;
            let notify = Arc::new(Notify::new());
            queue_state.subscribers.insert(subscriber, notify.clone());
            (subscriber, notify)
        };

        let (sender, receiver) = mpsc::channel(prefetch);
        let acker: Arc<dyn Acker> = Arc::new(QueueAcker {
            state: self.state.clone(),
            queue: queue.to_string(),
        });

        tokio::spawn(dispatch(
            self.state.clone(),
            queue.to_string(),
            subscriber,
            prefetch,
            notify,
            sender,
            acker,
        ));

        tracing::debug!(queue, subscriber, prefetch, "subscription opened");
        Ok(Subscription::new(receiver))
    }
}

/// Hands ready messages to one subscription while it has prefetch capacity.
async fn dispatch(
    state: Arc<Mutex<BrokerState>>,
    queue: String,
    subscriber: u64,
    prefetch: usize,
    notify: Arc<Notify>,
    sender: mpsc::Sender<Delivery>,
    acker: Arc<dyn Acker>,
) {
    loop {
        let next = {
            let mut guard = state.lock().await;
            let BrokerState {
                queues,
                next_delivery_tag,
                ..
            } = &mut *guard;

            match queues.get_mut(&queue) {
                Some(q) if q.outstanding(subscriber) < prefetch => {
                    q.ready.pop_front().map(|message| {
                        let tag = *next_delivery_tag;
                        *next_delivery_tag += 1;
                        q.unacked.insert(
                            tag,
                            Unacked {
                                subscriber,
                                message: message.clone(),
                            },
                        );
                        (tag, message)
                    })
                }
                Some(_) => None,
                None => break,
            }
        };

        match next {
            Some((tag, message)) => {
                let delivery =
                    Delivery::new(tag, message.envelope, message.redelivered, acker.clone());
                if sender.send(delivery).await.is_err() {
                    break;
                }
            }
            None => {
                tokio::select! {
                    _ = notify.notified() => {}
                    _ = sender.closed() => break,
                }
            }
        }
    }

    // Subscription closed: everything it left unsettled goes back to the
    // head of the queue, in original order.
    let mut guard = state.lock().await;
    if let Some(q) = guard.queues.get_mut(&queue) {
        q.subscribers.remove(&subscriber);

        let mut tags: Vec<u64> = q
            .unacked
            .iter()
            .filter(|(_, u)| u.subscriber == subscriber)
            .map(|(tag, _)| *tag)
            .collect();
        tags.sort_unstable();

        let returned = tags.len();
        for tag in tags.into_iter().rev() {
            if let Some(unacked) = q.unacked.remove(&tag) {
                let mut message = unacked.message;
                message.redelivered = true;
                q.ready.push_front(message);
            }
        }
        q.wake_all();

        tracing::debug!(queue = %queue, subscriber, returned, "subscription closed");
    }
}

struct QueueAcker {
    state: Arc<Mutex<BrokerState>>,
    queue: String,
}

#[async_trait]
impl Acker for QueueAcker {
    async fn ack(&self, delivery_tag: u64) -> Result<()> {
        let mut state = self.state.lock().await;
        let queue = state
            .queues
            .get_mut(&self.queue)
            .ok_or_else(|| BrokerError::QueueNotFound(self.queue.clone()))?;

        queue
            .unacked
            .remove(&delivery_tag)
            .ok_or(BrokerError::UnknownDelivery(delivery_tag))?;
        queue.wake_all();
        Ok(())
    }

    async fn nack(&self, delivery_tag: u64, requeue: bool) -> Result<()> {
        let mut guard = self.state.lock().await;
        let BrokerState {
            queues, discarded, ..
        } = &mut *guard;

        let queue = queues
            .get_mut(&self.queue)
            .ok_or_else(|| BrokerError::QueueNotFound(self.queue.clone()))?;

        let unacked = queue
            .unacked
            .remove(&delivery_tag)
            .ok_or(BrokerError::UnknownDelivery(delivery_tag))?;

        if requeue {
            let mut message = unacked.message;
            message.redelivered = true;
            queue.ready.push_front(message);
        } else {
            *discarded += 1;
        }
        queue.wake_all();
        Ok(())
    }
}
