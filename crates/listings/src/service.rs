//! Listing command service.

use chrono::Utc;
use common::{AggregateId, EventType};
use outbox::OutboxEntry;

use crate::{CreateListing, Listing, ListingInput, ListingStore, Result};

/// Applies listing commands and records one outbox entry per change.
pub struct ListingService<S: ListingStore> {
    store: S,
}

impl<S: ListingStore> ListingService<S> {
    /// Creates a new listing service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates a listing and emits `ListingCreated`.
    #[tracing::instrument(skip(self, request))]
    pub async fn create(&self, request: CreateListing) -> Result<Listing> {
        let input = request.listing.validate()?;
        let listing = Listing::create(request.owner_user_id, input, Utc::now());

        let entry = OutboxEntry::for_event(EventType::ListingCreated, &listing.created_event())?
            .with_occurred_at(listing.created_at);
        self.store.insert(&listing, &entry).await?;

        metrics::counter!("listing_commands_total", "command" => "create").increment(1);
        tracing::info!(listing_id = %listing.id, outbox_entry = %entry.id, "listing created");
        Ok(listing)
    }

    /// Replaces the editable fields of a live listing and emits
    /// `ListingUpdated`. Returns `None` for unknown or deleted listings.
    #[tracing::instrument(skip(self, input))]
    pub async fn update(&self, id: AggregateId, input: ListingInput) -> Result<Option<Listing>> {
        let input = input.validate()?;

        let Some(mut listing) = self.store.get(id).await?.filter(|l| !l.is_deleted) else {
            return Ok(None);
        };

        listing.apply(input, Utc::now());
        let entry = OutboxEntry::for_event(EventType::ListingUpdated, &listing.updated_event())?
            .with_occurred_at(listing.updated_at);
        self.store.update(&listing, &entry).await?;

        metrics::counter!("listing_commands_total", "command" => "update").increment(1);
        tracing::info!(listing_id = %listing.id, outbox_entry = %entry.id, "listing updated");
        Ok(Some(listing))
    }

    /// Soft-deletes a listing and emits `ListingDeleted`.
    ///
    /// Returns `false` only when the listing never existed. Deleting an
    /// already deleted listing succeeds without emitting another event.
    #[tracing::instrument(skip(self))]
    pub async fn soft_delete(&self, id: AggregateId) -> Result<bool> {
        let Some(mut listing) = self.store.get(id).await? else {
            return Ok(false);
        };
        if listing.is_deleted {
            return Ok(true);
        }

        let now = Utc::now();
        listing.mark_deleted(now);
        let entry = OutboxEntry::for_event(EventType::ListingDeleted, &listing.deleted_event(now))?
            .with_occurred_at(now);
        self.store.update(&listing, &entry).await?;

        metrics::counter!("listing_commands_total", "command" => "delete").increment(1);
        tracing::info!(listing_id = %listing.id, outbox_entry = %entry.id, "listing deleted");
        Ok(true)
    }

    /// Loads a live listing. Deleted listings read as absent.
    pub async fn get(&self, id: AggregateId) -> Result<Option<Listing>> {
        Ok(self.store.get(id).await?.filter(|l| !l.is_deleted))
    }
}

#[cfg(test)]
mod tests {
    use common::{ListingCreated, ListingDeleted, ListingUpdated};
    use outbox::{InMemoryOutboxStore, OutboxStore};
    use uuid::Uuid;

    use super::*;
    use crate::{InMemoryListingStore, ListingError};

    fn service() -> (ListingService<InMemoryListingStore>, InMemoryOutboxStore) {
        let outbox = InMemoryOutboxStore::new();
        let store = InMemoryListingStore::new(outbox.clone());
        (ListingService::new(store), outbox)
    }

    fn input(title: &str, price: i64) -> ListingInput {
        ListingInput {
            title: title.to_string(),
            category_id: "phones".to_string(),
            brand_id: "apple".to_string(),
            city: "hcm".to_string(),
            condition: "like_new".to_string(),
            price,
        }
    }

    fn create_request(title: &str) -> CreateListing {
        CreateListing {
            owner_user_id: Uuid::new_v4(),
            listing: input(title, 15_000_000),
        }
    }

    #[tokio::test]
    async fn create_writes_row_and_created_event() {
        let (service, outbox) = service();

        let listing = service.create(create_request(" iPhone 13 ")).await.unwrap();
        assert_eq!(listing.title, "iPhone 13");

        let entries = outbox.all_entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event_type, "ListingCreated");
        let event: ListingCreated = entries[0].to_envelope().decode().unwrap();
        assert_eq!(event.id, listing.id);
        assert_eq!(event.title, "iPhone 13");
        assert_eq!(event.created_at_utc, listing.created_at);
    }

    #[tokio::test]
    async fn invalid_input_writes_nothing() {
        let (service, outbox) = service();

        let result = service
            .create(CreateListing {
                owner_user_id: Uuid::nil(),
                listing: input("phone", 0),
            })
            .await;

        assert!(matches!(result, Err(ListingError::Validation(_))));
        assert_eq!(outbox.entry_count().await, 0);
        assert_eq!(service.store().listing_count().await, 0);
    }

    #[tokio::test]
    async fn update_emits_full_state() {
        let (service, outbox) = service();
        let listing = service.create(create_request("Pixel")).await.unwrap();

        let updated = service
            .update(listing.id, input("Pixel 8", 9_000_000))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.price, 9_000_000);

        let entries = outbox.all_entries().await;
        assert_eq!(entries.len(), 2);
        let event: ListingUpdated = entries[1].to_envelope().decode().unwrap();
        assert_eq!(event.title, "Pixel 8");
        assert_eq!(event.created_at_utc, listing.created_at);
    }

    #[tokio::test]
    async fn update_of_unknown_listing_is_none() {
        let (service, outbox) = service();
        let result = service
            .update(AggregateId::new(), input("ghost", 1))
            .await
            .unwrap();
        assert!(result.is_none());
        assert_eq!(outbox.entry_count().await, 0);
    }

    #[tokio::test]
    async fn soft_delete_is_idempotent() {
        let (service, outbox) = service();
        let listing = service.create(create_request("Kindle")).await.unwrap();

        assert!(service.soft_delete(listing.id).await.unwrap());
        assert!(service.soft_delete(listing.id).await.unwrap());

        let entries = outbox.all_entries().await;
        let deletes: Vec<_> = entries
            .iter()
            .filter(|e| e.event_type == "ListingDeleted")
            .collect();
        assert_eq!(deletes.len(), 1);
        let event: ListingDeleted = deletes[0].to_envelope().decode().unwrap();
        assert_eq!(event.id, listing.id);

        assert!(service.get(listing.id).await.unwrap().is_none());
        assert!(service.update(listing.id, input("back", 1)).await.unwrap().is_none());
        assert!(!service.soft_delete(AggregateId::new()).await.unwrap());
    }

    #[tokio::test]
    async fn outbox_failure_leaves_row_unchanged() {
        let (service, outbox) = service();
        let listing = service.create(create_request("Switch")).await.unwrap();

        outbox.set_failing(true);
        let result = service.update(listing.id, input("Switch OLED", 7_000_000)).await;
        assert!(matches!(result, Err(ListingError::Outbox(_))));
        let create = service.create(create_request("Deck")).await;
        assert!(create.is_err());
        outbox.set_failing(false);

        let stored = service.get(listing.id).await.unwrap().unwrap();
        assert_eq!(stored.title, "Switch");
        assert_eq!(service.store().listing_count().await, 1);
        assert_eq!(outbox.pending_count().await, 1);
        assert_eq!(
            outbox.fetch_pending(10).await.unwrap()[0].event_type,
            "ListingCreated"
        );
    }
}
