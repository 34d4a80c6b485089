//! PostgreSQL integration tests for the listing store.
//!
//! Run with:
//!
//! ```bash
//! cargo test -p listings --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use common::AggregateId;
use listings::{CreateListing, ListingInput, ListingService, PostgresListingStore};
use outbox::{OutboxStore, PostgresOutboxStore};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            for migration in [
                include_str!("../../../migrations/001_create_outbox_messages.sql"),
                include_str!("../../../migrations/002_create_listings.sql"),
            ] {
                sqlx::raw_sql(migration).execute(&temp_pool).await.unwrap();
            }
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

async fn get_test_pool() -> PgPool {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE listings, outbox_messages")
        .execute(&pool)
        .await
        .unwrap();

    pool
}

fn input(title: &str) -> ListingInput {
    ListingInput {
        title: title.to_string(),
        category_id: "cameras".to_string(),
        brand_id: "fujifilm".to_string(),
        city: "danang".to_string(),
        condition: "used_95".to_string(),
        price: 18_500_000,
    }
}

#[tokio::test]
#[serial]
async fn create_commits_row_and_outbox_entry_together() {
    let pool = get_test_pool().await;
    let service = ListingService::new(PostgresListingStore::new(pool.clone()));
    let outbox = PostgresOutboxStore::new(pool);

    let listing = service
        .create(CreateListing {
            owner_user_id: Uuid::new_v4(),
            listing: input("X100V"),
        })
        .await
        .unwrap();

    let stored = service.get(listing.id).await.unwrap().unwrap();
    assert_eq!(stored.title, "X100V");
    assert_eq!(stored.price, 18_500_000);

    let pending = outbox.fetch_pending(10).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].event_type, "ListingCreated");
}

#[tokio::test]
#[serial]
async fn update_and_delete_append_entries_in_order() {
    let pool = get_test_pool().await;
    let service = ListingService::new(PostgresListingStore::new(pool.clone()));
    let outbox = PostgresOutboxStore::new(pool);

    let listing = service
        .create(CreateListing {
            owner_user_id: Uuid::nil(),
            listing: input("X-T5"),
        })
        .await
        .unwrap();
    service
        .update(listing.id, input("X-T5 body"))
        .await
        .unwrap()
        .unwrap();
    assert!(service.soft_delete(listing.id).await.unwrap());
    assert!(service.soft_delete(listing.id).await.unwrap());

    let types: Vec<_> = outbox
        .fetch_pending(10)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.event_type)
        .collect();
    assert_eq!(
        types,
        vec!["ListingCreated", "ListingUpdated", "ListingDeleted"]
    );
    assert!(service.get(listing.id).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn missing_listing_is_not_updated() {
    let pool = get_test_pool().await;
    let service = ListingService::new(PostgresListingStore::new(pool.clone()));
    let outbox = PostgresOutboxStore::new(pool);

    let result = service.update(AggregateId::new(), input("none")).await.unwrap();
    assert!(result.is_none());
    assert!(!service.soft_delete(AggregateId::new()).await.unwrap());
    assert!(outbox.fetch_pending(10).await.unwrap().is_empty());
}
