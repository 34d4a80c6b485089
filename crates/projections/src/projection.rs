//! Idempotent projection of listing events into the search index.

use std::sync::Arc;

use async_trait::async_trait;
use common::{AggregateId, Envelope, EventType, ListingCreated, ListingUpdated};
use serde::Deserialize;

use crate::{ListingSearchDocument, ProjectionError, Result, SearchIndex};

/// What applying one event did to the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionOutcome {
    /// The document was written (created or fully replaced).
    Upserted,
    /// A delete was applied; `existed` is false when it was already gone.
    Deleted { existed: bool },
}

/// Applies event envelopes to a read model.
///
/// Implementations must be idempotent: the broker may deliver the same
/// envelope more than once, and several deliveries may be applied
/// concurrently.
#[async_trait]
pub trait Projector: Send + Sync {
    /// Returns the name of this projector.
    fn name(&self) -> &'static str;

    /// Applies one envelope. Unrecognized event types fail with
    /// [`ProjectionError::UnknownEventType`].
    async fn apply(&self, envelope: &Envelope) -> Result<ProjectionOutcome>;
}

#[async_trait]
impl<T: Projector + ?Sized> Projector for Arc<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn apply(&self, envelope: &Envelope) -> Result<ProjectionOutcome> {
        (**self).apply(envelope).await
    }
}

/// Only the id of a delete payload matters.
#[derive(Deserialize)]
struct DeletedRef {
    #[serde(default)]
    id: Option<AggregateId>,
}

/// Projects listing events into a [`SearchIndex`].
///
/// Created and updated events upsert the full document; deleted events
/// remove it. The last applied write wins: there is no version check, so a
/// stale update delivered after a newer one overwrites it.
#[derive(Clone)]
pub struct ListingProjector<I> {
    index: I,
}

impl<I: SearchIndex> ListingProjector<I> {
    pub fn new(index: I) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    async fn upsert(&self, document: ListingSearchDocument) -> Result<ProjectionOutcome> {
        if document.id.is_nil() {
            return Err(ProjectionError::InvalidPayload("id is empty".to_string()));
        }
        self.index.upsert(&document).await?;
        Ok(ProjectionOutcome::Upserted)
    }

    async fn delete(&self, envelope: &Envelope) -> Result<ProjectionOutcome> {
        let DeletedRef { id } = envelope.decode()?;
        let id = id.ok_or_else(|| ProjectionError::InvalidPayload("missing 'id'".to_string()))?;
        if id.is_nil() {
            return Err(ProjectionError::InvalidPayload("empty 'id'".to_string()));
        }

        let existed = self.index.delete(id).await?;
        Ok(ProjectionOutcome::Deleted { existed })
    }
}

#[async_trait]
impl<I: SearchIndex> Projector for ListingProjector<I> {
    fn name(&self) -> &'static str {
        "ListingProjector"
    }

    async fn apply(&self, envelope: &Envelope) -> Result<ProjectionOutcome> {
        let Some(event_type) = envelope.known_type() else {
            return Err(ProjectionError::UnknownEventType(envelope.event_type.clone()));
        };

        match event_type {
            EventType::ListingCreated => {
                let event: ListingCreated = envelope.decode()?;
                self.upsert(event.into()).await
            }
            EventType::ListingUpdated => {
                let event: ListingUpdated = envelope.decode()?;
                self.upsert(event.into()).await
            }
            EventType::ListingDeleted => self.delete(envelope).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use common::ListingDeleted;
    use uuid::Uuid;

    use super::*;
    use crate::InMemorySearchIndex;

    fn created(id: AggregateId, title: &str) -> ListingCreated {
        ListingCreated {
            id,
            owner_user_id: Uuid::new_v4(),
            title: title.to_string(),
            category_id: "bikes".to_string(),
            brand_id: "giant".to_string(),
            city: "hanoi".to_string(),
            condition: "used".to_string(),
            price: 4_500_000,
            created_at_utc: Utc::now(),
        }
    }

    fn projector() -> ListingProjector<InMemorySearchIndex> {
        ListingProjector::new(InMemorySearchIndex::new())
    }

    #[tokio::test]
    async fn created_event_upserts_document() {
        let projector = projector();
        let id = AggregateId::new();
        let envelope =
            Envelope::from_event(EventType::ListingCreated, &created(id, "Escape 3")).unwrap();

        let outcome = projector.apply(&envelope).await.unwrap();
        assert_eq!(outcome, ProjectionOutcome::Upserted);

        let doc = projector.index().get(id).await.unwrap().unwrap();
        assert_eq!(doc.title, "Escape 3");
        assert_eq!(doc.updated_at_utc, None);
    }

    #[tokio::test]
    async fn applying_twice_gives_the_same_document() {
        let projector = projector();
        let id = AggregateId::new();
        let envelope =
            Envelope::from_event(EventType::ListingCreated, &created(id, "Talon")).unwrap();

        projector.apply(&envelope).await.unwrap();
        let first = projector.index().get(id).await.unwrap();
        projector.apply(&envelope).await.unwrap();
        let second = projector.index().get(id).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(projector.index().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn update_replaces_whole_document() {
        let projector = projector();
        let id = AggregateId::new();
        let original = created(id, "Old title");
        projector
            .apply(&Envelope::from_event(EventType::ListingCreated, &original).unwrap())
            .await
            .unwrap();

        let updated = ListingUpdated {
            id,
            title: "New title".to_string(),
            category_id: "bikes".to_string(),
            brand_id: "trek".to_string(),
            city: "hue".to_string(),
            condition: "like_new".to_string(),
            price: 3_900_000,
            created_at_utc: original.created_at_utc,
            updated_at_utc: original.created_at_utc + Duration::minutes(5),
        };
        projector
            .apply(&Envelope::from_event(EventType::ListingUpdated, &updated).unwrap())
            .await
            .unwrap();

        let doc = projector.index().get(id).await.unwrap().unwrap();
        assert_eq!(doc, ListingSearchDocument::from(updated));
    }

    #[tokio::test]
    async fn delete_of_missing_document_succeeds() {
        let projector = projector();
        let event = ListingDeleted {
            id: AggregateId::new(),
            deleted_at_utc: Utc::now(),
        };
        let envelope = Envelope::from_event(EventType::ListingDeleted, &event).unwrap();

        let outcome = projector.apply(&envelope).await.unwrap();
        assert_eq!(outcome, ProjectionOutcome::Deleted { existed: false });
    }

    #[tokio::test]
    async fn delete_needs_only_an_id() {
        let projector = projector();
        let id = AggregateId::new();
        projector
            .apply(&Envelope::from_event(EventType::ListingCreated, &created(id, "x")).unwrap())
            .await
            .unwrap();

        let body = format!(r#"{{"id":"{id}"}}"#);
        let envelope = Envelope::new("ListingDeleted", body.into_bytes());
        let outcome = projector.apply(&envelope).await.unwrap();

        assert_eq!(outcome, ProjectionOutcome::Deleted { existed: true });
        assert!(projector.index().get(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn invalid_payloads_are_rejected() {
        let projector = projector();

        let missing_id = Envelope::new("ListingDeleted", b"{}".to_vec());
        assert!(matches!(
            projector.apply(&missing_id).await,
            Err(ProjectionError::InvalidPayload(_))
        ));

        let nil_id = Envelope::from_event(
            EventType::ListingCreated,
            &created(AggregateId::nil(), "nil"),
        )
        .unwrap();
        assert!(matches!(
            projector.apply(&nil_id).await,
            Err(ProjectionError::InvalidPayload(_))
        ));

        let garbage = Envelope::new("ListingUpdated", b"not json".to_vec());
        assert!(matches!(
            projector.apply(&garbage).await,
            Err(ProjectionError::Deserialization(_))
        ));
        assert_eq!(projector.index().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unknown_event_type_is_reported() {
        let projector = projector();
        let envelope = Envelope::new("ListingArchived", b"{}".to_vec());

        let err = projector.apply(&envelope).await.unwrap_err();
        assert!(matches!(err, ProjectionError::UnknownEventType(t) if t == "ListingArchived"));
    }

    #[tokio::test]
    async fn index_outage_surfaces_as_error() {
        let projector = projector();
        projector.index().set_available(false);
        let envelope = Envelope::from_event(
            EventType::ListingCreated,
            &created(AggregateId::new(), "offline"),
        )
        .unwrap();

        assert!(matches!(
            projector.apply(&envelope).await,
            Err(ProjectionError::IndexUnavailable(_))
        ));
    }
}
