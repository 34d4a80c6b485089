use chrono::{DateTime, Utc};
use common::{Envelope, EventType};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an outbox entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutboxEntryId(Uuid);

impl OutboxEntryId {
    /// Creates a new random entry ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an entry ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for OutboxEntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OutboxEntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for OutboxEntryId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// A domain event waiting to be (or already) handed to the broker.
///
/// An entry is pending while `published_at` is `None`. `attempts` counts
/// every publish attempt whatever its result; `last_error` holds the reason
/// of the most recent failure and is cleared by a success. Entries are
/// retained after publishing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxEntry {
    pub id: OutboxEntryId,
    pub occurred_at: DateTime<Utc>,
    pub event_type: String,
    pub payload: Vec<u8>,
    pub published_at: Option<DateTime<Utc>>,
    pub attempts: i32,
    pub last_error: Option<String>,
}

impl OutboxEntry {
    /// Creates a pending entry that occurred now.
    pub fn new(event_type: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            id: OutboxEntryId::new(),
            occurred_at: Utc::now(),
            event_type: event_type.into(),
            payload: payload.into(),
            published_at: None,
            attempts: 0,
            last_error: None,
        }
    }

    /// Creates a pending entry holding the JSON encoding of `event`.
    pub fn for_event<T: Serialize>(
        event_type: EventType,
        event: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(event_type.as_str(), serde_json::to_vec(event)?))
    }

    /// Overrides the occurrence timestamp.
    pub fn with_occurred_at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = occurred_at;
        self
    }

    pub fn is_pending(&self) -> bool {
        self.published_at.is_none()
    }

    /// Records a successful publish attempt.
    pub fn record_success(&mut self, published_at: DateTime<Utc>) {
        self.published_at = Some(published_at);
        self.attempts = self.attempts.saturating_add(1);
        self.last_error = None;
    }

    /// Records a failed publish attempt. The entry stays pending.
    pub fn record_failure(&mut self, reason: impl Into<String>) {
        self.attempts = self.attempts.saturating_add(1);
        self.last_error = Some(reason.into());
    }

    /// The message handed to the broker for this entry.
    pub fn to_envelope(&self) -> Envelope {
        Envelope::new(self.event_type.clone(), self.payload.clone())
    }

    pub fn summary(&self) -> PendingEntry {
        PendingEntry {
            id: self.id,
            event_type: self.event_type.clone(),
            occurred_at: self.occurred_at,
            attempts: self.attempts,
        }
    }
}

/// Diagnostic view of a pending entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingEntry {
    pub id: OutboxEntryId,
    #[serde(rename = "type")]
    pub event_type: String,
    pub occurred_at: DateTime<Utc>,
    pub attempts: i32,
}

#[cfg(test)]
mod tests {
    use common::{AggregateId, ListingDeleted};

    use super::*;

    #[test]
    fn new_entry_is_pending_with_no_attempts() {
        let entry = OutboxEntry::new("ListingCreated", b"{}".to_vec());
        assert!(entry.is_pending());
        assert_eq!(entry.attempts, 0);
        assert!(entry.last_error.is_none());
    }

    #[test]
    fn failure_then_success_clears_error() {
        let mut entry = OutboxEntry::new("ListingUpdated", b"{}".to_vec());

        entry.record_failure("connection refused");
        assert!(entry.is_pending());
        assert_eq!(entry.attempts, 1);
        assert_eq!(entry.last_error.as_deref(), Some("connection refused"));

        let now = Utc::now();
        entry.record_success(now);
        assert!(!entry.is_pending());
        assert_eq!(entry.published_at, Some(now));
        assert_eq!(entry.attempts, 2);
        assert!(entry.last_error.is_none());
    }

    #[test]
    fn for_event_encodes_payload_and_routing_key() {
        let event = ListingDeleted {
            id: AggregateId::new(),
            deleted_at_utc: Utc::now(),
        };
        let entry = OutboxEntry::for_event(EventType::ListingDeleted, &event).unwrap();
        let envelope = entry.to_envelope();

        assert_eq!(envelope.event_type, "ListingDeleted");
        assert_eq!(envelope.decode::<ListingDeleted>().unwrap(), event);
    }

    #[test]
    fn pending_summary_serializes_type_field() {
        let entry = OutboxEntry::new("ListingCreated", b"{}".to_vec());
        let json = serde_json::to_value(entry.summary()).unwrap();
        assert_eq!(json["type"], "ListingCreated");
        assert_eq!(json["attempts"], 0);
        assert!(json.get("occurredAt").is_some());
    }
}
