//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p outbox --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use chrono::{Duration, Utc};
use outbox::{OutboxEntry, OutboxError, OutboxStore, OutboxStoreExt, PostgresOutboxStore};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
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
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_outbox_messages.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and an empty outbox table
async fn get_test_store() -> PostgresOutboxStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE outbox_messages")
        .execute(&pool)
        .await
        .unwrap();

    PostgresOutboxStore::new(pool)
}

fn entry_at(offset_secs: i64) -> OutboxEntry {
    OutboxEntry::new("ListingCreated", br#"{"id":"x"}"#.to_vec())
        .with_occurred_at(Utc::now() + Duration::seconds(offset_secs))
}

#[tokio::test]
#[serial]
async fn enqueue_and_get_round_trip_columns() {
    let store = get_test_store().await;
    let entry = entry_at(0);
    store.enqueue(entry.clone()).await.unwrap();

    let stored = store.get(entry.id).await.unwrap().unwrap();
    assert_eq!(stored.event_type, "ListingCreated");
    assert_eq!(stored.payload, entry.payload);
    assert_eq!(stored.attempts, 0);
    assert!(stored.is_pending());
}

#[tokio::test]
#[serial]
async fn duplicate_id_maps_to_duplicate_entry() {
    let store = get_test_store().await;
    let entry = entry_at(0);
    store.enqueue(entry.clone()).await.unwrap();

    let result = store.enqueue(entry.clone()).await;
    assert!(matches!(result, Err(OutboxError::DuplicateEntry(id)) if id == entry.id));
}

#[tokio::test]
#[serial]
async fn fetch_pending_orders_by_occurred_at_and_limits() {
    let store = get_test_store().await;
    let late = entry_at(60);
    let early = entry_at(-60);
    let middle = entry_at(0);
    for e in [&late, &early, &middle] {
        store.enqueue(e.clone()).await.unwrap();
    }

    let pending = store.fetch_pending(2).await.unwrap();
    let ids: Vec<_> = pending.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![early.id, middle.id]);
}

#[tokio::test]
#[serial]
async fn save_outcomes_marks_published_and_keeps_row() {
    let store = get_test_store().await;
    let mut ok = entry_at(0);
    let mut failed = entry_at(1);
    store.enqueue(ok.clone()).await.unwrap();
    store.enqueue(failed.clone()).await.unwrap();

    ok.record_success(Utc::now());
    failed.record_failure("Broker unavailable: connection refused");
    store
        .save_outcomes(&[ok.clone(), failed.clone()])
        .await
        .unwrap();

    let pending = store.fetch_pending(10).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, failed.id);
    assert_eq!(pending[0].attempts, 1);
    assert_eq!(
        pending[0].last_error.as_deref(),
        Some("Broker unavailable: connection refused")
    );

    let published = store.get(ok.id).await.unwrap().unwrap();
    assert!(published.published_at.is_some());
    assert!(published.last_error.is_none());
}

#[tokio::test]
#[serial]
async fn save_outcomes_rolls_back_on_unknown_entry() {
    let store = get_test_store().await;
    let mut known = entry_at(0);
    store.enqueue(known.clone()).await.unwrap();

    known.record_success(Utc::now());
    let mut unknown = entry_at(1);
    unknown.record_failure("boom");

    let result = store.save_outcomes(&[known.clone(), unknown.clone()]).await;
    assert!(matches!(result, Err(OutboxError::EntryNotFound(id)) if id == unknown.id));

    let stored = store.get(known.id).await.unwrap().unwrap();
    assert!(stored.is_pending());
    assert_eq!(stored.attempts, 0);
}

#[tokio::test]
#[serial]
async fn stale_outcome_does_not_lower_attempts() {
    let store = get_test_store().await;
    let mut entry = entry_at(0);
    store.enqueue(entry.clone()).await.unwrap();

    let mut stale = entry.clone();
    stale.record_failure("first");
    entry.record_failure("first");
    entry.record_failure("second");

    store.save_outcomes(&[entry.clone()]).await.unwrap();
    store.save_outcomes(&[stale]).await.unwrap();

    let stored = store.get(entry.id).await.unwrap().unwrap();
    assert_eq!(stored.attempts, 2);
}

#[tokio::test]
#[serial]
async fn pending_summary_lists_oldest_entries() {
    let store = get_test_store().await;
    for offset in 0..3 {
        store.enqueue(entry_at(offset)).await.unwrap();
    }

    let summary = store.pending_summary(2).await.unwrap();
    assert_eq!(summary.len(), 2);
    assert!(summary[0].occurred_at <= summary[1].occurred_at);
    assert!(summary.iter().all(|s| s.event_type == "ListingCreated"));
}

#[tokio::test]
#[serial]
async fn run_migrations_creates_schema_on_fresh_database() {
    let info = get_container_info().await;
    let admin = PgPool::connect(&info.connection_string).await.unwrap();
    sqlx::query("DROP DATABASE IF EXISTS migrations_fresh")
        .execute(&admin)
        .await
        .unwrap();
    sqlx::query("CREATE DATABASE migrations_fresh")
        .execute(&admin)
        .await
        .unwrap();

    let base = info.connection_string.strip_suffix("/postgres").unwrap();
    let url = format!("{base}/migrations_fresh");
    let pool = PgPool::connect(&url).await.unwrap();
    let store = PostgresOutboxStore::new(pool.clone());
    store.run_migrations().await.unwrap();
    store.run_migrations().await.unwrap();

    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT table_name::text FROM information_schema.tables \
         WHERE table_schema = 'public' AND table_name <> '_sqlx_migrations' \
         ORDER BY table_name",
    )
    .fetch_all(&pool)
    .await
    .unwrap();
    assert_eq!(
        tables,
        vec!["listing_search_documents", "listings", "outbox_messages"]
    );

    let entry = OutboxEntry::new("ListingCreated", b"{}".to_vec());
    store.enqueue(entry.clone()).await.unwrap();
    assert_eq!(store.fetch_pending(10).await.unwrap().len(), 1);

    pool.close().await;
    admin.close().await;
}
