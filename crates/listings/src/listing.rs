//! Listing write model and the requests that change it.

use chrono::{DateTime, Utc};
use common::{AggregateId, ListingCreated, ListingDeleted, ListingUpdated};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ListingError, Result};

/// A listing row. Deleted listings are kept with `is_deleted` set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: AggregateId,
    pub owner_user_id: Uuid,
    pub title: String,
    pub category_id: String,
    pub brand_id: String,
    pub city: String,
    pub condition: String,
    /// Asking price in the smallest currency unit.
    pub price: i64,
    #[serde(rename = "createdAtUtc")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAtUtc")]
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub is_deleted: bool,
}

impl Listing {
    /// Builds a new live listing from validated input.
    pub fn create(owner_user_id: Uuid, input: ListingInput, now: DateTime<Utc>) -> Self {
        let owner_user_id = if owner_user_id.is_nil() {
            Uuid::new_v4()
        } else {
            owner_user_id
        };

        Self {
            id: AggregateId::new(),
            owner_user_id,
            title: input.title,
            category_id: input.category_id,
            brand_id: input.brand_id,
            city: input.city,
            condition: input.condition,
            price: input.price,
            created_at: now,
            updated_at: now,
            is_deleted: false,
        }
    }

    /// Replaces every editable field.
    pub fn apply(&mut self, input: ListingInput, now: DateTime<Utc>) {
        self.title = input.title;
        self.category_id = input.category_id;
        self.brand_id = input.brand_id;
        self.city = input.city;
        self.condition = input.condition;
        self.price = input.price;
        self.updated_at = now;
    }

    pub fn mark_deleted(&mut self, now: DateTime<Utc>) {
        self.is_deleted = true;
        self.updated_at = now;
    }

    pub fn created_event(&self) -> ListingCreated {
        ListingCreated {
            id: self.id,
            owner_user_id: self.owner_user_id,
            title: self.title.clone(),
            category_id: self.category_id.clone(),
            brand_id: self.brand_id.clone(),
            city: self.city.clone(),
            condition: self.condition.clone(),
            price: self.price,
            created_at_utc: self.created_at,
        }
    }

    pub fn updated_event(&self) -> ListingUpdated {
        ListingUpdated {
            id: self.id,
            title: self.title.clone(),
            category_id: self.category_id.clone(),
            brand_id: self.brand_id.clone(),
            city: self.city.clone(),
            condition: self.condition.clone(),
            price: self.price,
            created_at_utc: self.created_at,
            updated_at_utc: self.updated_at,
        }
    }

    pub fn deleted_event(&self, deleted_at: DateTime<Utc>) -> ListingDeleted {
        ListingDeleted {
            id: self.id,
            deleted_at_utc: deleted_at,
        }
    }
}

/// Editable listing fields, as sent by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingInput {
    pub title: String,
    pub category_id: String,
    pub brand_id: String,
    pub city: String,
    pub condition: String,
    pub price: i64,
}

impl ListingInput {
    /// Trims every text field and rejects blanks and non-positive prices.
    pub fn validate(self) -> Result<Self> {
        let input = Self {
            title: required(self.title, "title")?,
            category_id: required(self.category_id, "categoryId")?,
            brand_id: required(self.brand_id, "brandId")?,
            city: required(self.city, "city")?,
            condition: required(self.condition, "condition")?,
            price: self.price,
        };

        if input.price <= 0 {
            return Err(ListingError::validation("price must be > 0"));
        }

        Ok(input)
    }
}

fn required(value: String, field: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ListingError::validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

/// Request to create a listing. A missing or nil owner gets a fresh id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateListing {
    #[serde(default)]
    pub owner_user_id: Uuid,
    #[serde(flatten)]
    pub listing: ListingInput,
}
