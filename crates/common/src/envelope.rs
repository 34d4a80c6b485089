use serde::{Serialize, de::DeserializeOwned};

use crate::EventType;

/// Wire form of an event as it travels through the broker.
///
/// `event_type` is both the routing key on publish and the dispatch
/// discriminator on consume. It is kept as a plain string so that a consumer
/// can receive (and decide what to do with) types it does not know about.
/// The payload is opaque to the broker.
///
/// There is no version or sequence number: two envelopes for the
/// same aggregate are ordered only by broker delivery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub event_type: String,
    pub payload: Vec<u8>,
}

impl Envelope {
    pub fn new(event_type: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            event_type: event_type.into(),
            payload: payload.into(),
        }
    }

    /// JSON-encodes `event` under the routing key of `event_type`.
    pub fn from_event<T: Serialize>(
        event_type: EventType,
        event: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event_type: event_type.as_str().to_string(),
            payload: serde_json::to_vec(event)?,
        })
    }

    /// Parses the routing key, if it names a known event type.
    pub fn known_type(&self) -> Option<EventType> {
        self.event_type.parse().ok()
    }

    /// Decodes the JSON payload.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }
}
