//! Listing event contracts.
//!
//! Payloads are camelCase JSON. The event type name is the broker routing key,
//! so renaming a variant is a wire-breaking change.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::AggregateId;

/// Kinds of listing events understood by this pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    ListingCreated,
    ListingUpdated,
    ListingDeleted,
}

impl EventType {
    /// Every known event type, in the order consumers bind them.
    pub const ALL: [EventType; 3] = [
        EventType::ListingCreated,
        EventType::ListingUpdated,
        EventType::ListingDeleted,
    ];

    /// Routing key / dispatch name.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::ListingCreated => "ListingCreated",
            EventType::ListingUpdated => "ListingUpdated",
            EventType::ListingDeleted => "ListingDeleted",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a routing key does not name a known [`EventType`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown event type: {0}")]
pub struct UnknownEventType(pub String);

impl FromStr for EventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownEventType(s.to_string()))
    }
}

/// Emitted when a listing is first written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingCreated {
    pub id: AggregateId,
    pub owner_user_id: Uuid,
    pub title: String,
    pub category_id: String,
    pub brand_id: String,
    pub city: String,
    pub condition: String,
    pub price: i64,
    pub created_at_utc: DateTime<Utc>,
}

/// Emitted on every edit. Carries the full searchable state so that the
/// projection can replace the document wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingUpdated {
    pub id: AggregateId,
    pub title: String,
    pub category_id: String,
    pub brand_id: String,
    pub city: String,
    pub condition: String,
    pub price: i64,
    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: DateTime<Utc>,
}

/// Emitted once when a listing is soft-deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingDeleted {
    pub id: AggregateId,
    pub deleted_at_utc: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_keys_round_trip_through_from_str() {
        for event_type in EventType::ALL {
            assert_eq!(event_type.as_str().parse::<EventType>(), Ok(event_type));
        }
    }

    #[test]
    fn unknown_routing_key_is_rejected() {
        let err = "ListingArchived".parse::<EventType>().unwrap_err();
        assert_eq!(err, UnknownEventType("ListingArchived".to_string()));
        assert!("listingcreated".parse::<EventType>().is_err());
    }

    #[test]
    fn deleted_payload_uses_camel_case() {
        let event = ListingDeleted {
            id: AggregateId::new(),
            deleted_at_utc: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("id").is_some());
        assert!(json.get("deletedAtUtc").is_some());
    }

    #[test]
    fn created_payload_field_names() {
        let event = ListingCreated {
            id: AggregateId::new(),
            owner_user_id: Uuid::new_v4(),
            title: "Road bike".to_string(),
            category_id: "bikes".to_string(),
            brand_id: "trek".to_string(),
            city: "hanoi".to_string(),
            condition: "used_95".to_string(),
            price: 12_000_000,
            created_at_utc: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        for field in [
            "ownerUserId",
            "categoryId",
            "brandId",
            "createdAtUtc",
            "price",
        ] {
            assert!(json.get(field).is_some(), "missing {field}");
        }
    }
}
