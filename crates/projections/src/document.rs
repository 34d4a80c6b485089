use chrono::{DateTime, Utc};
use common::{AggregateId, ListingCreated, ListingUpdated};
use serde::{Deserialize, Serialize};

/// Searchable projection of a listing, keyed by listing id.
///
/// Every upsert replaces the whole document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingSearchDocument {
    pub id: AggregateId,
    pub title: String,
    pub category_id: String,
    pub brand_id: String,
    pub city: String,
    pub condition: String,
    pub price: i64,
    pub created_at_utc: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at_utc: Option<DateTime<Utc>>,
}

impl From<ListingCreated> for ListingSearchDocument {
    fn from(event: ListingCreated) -> Self {
        Self {
            id: event.id,
            title: event.title,
            category_id: event.category_id,
            brand_id: event.brand_id,
            city: event.city,
            condition: event.condition,
            price: event.price,
            created_at_utc: event.created_at_utc,
            updated_at_utc: None,
        }
    }
}

impl From<ListingUpdated> for ListingSearchDocument {
    fn from(event: ListingUpdated) -> Self {
        Self {
            id: event.id,
            title: event.title,
            category_id: event.category_id,
            brand_id: event.brand_id,
            city: event.city,
            condition: event.condition,
            price: event.price,
            created_at_utc: event.created_at_utc,
            updated_at_utc: Some(event.updated_at_utc),
        }
    }
}
