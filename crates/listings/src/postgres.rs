use async_trait::async_trait;
use common::AggregateId;
use outbox::{OutboxEntry, postgres::insert_entry};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{Listing, ListingError, ListingStore, Result};

/// PostgreSQL-backed listing store. Each mutation runs in one transaction
/// together with its `outbox_messages` insert.
#[derive(Clone)]
pub struct PostgresListingStore {
    pool: PgPool,
}

impl PostgresListingStore {
    /// Creates a new PostgreSQL listing store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_listing(row: PgRow) -> Result<Listing> {
        Ok(Listing {
            id: AggregateId::from_uuid(row.try_get::<Uuid, _>("id")?),
            owner_user_id: row.try_get("owner_user_id")?,
            title: row.try_get("title")?,
            category_id: row.try_get("category_id")?,
            brand_id: row.try_get("brand_id")?,
            city: row.try_get("city")?,
            condition: row.try_get("condition")?,
            price: row.try_get("price")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            is_deleted: row.try_get("is_deleted")?,
        })
    }
}

#[async_trait]
impl ListingStore for PostgresListingStore {
    #[tracing::instrument(skip(self, listing, entry), fields(listing_id = %listing.id))]
    async fn insert(&self, listing: &Listing, entry: &OutboxEntry) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO listings (id, owner_user_id, title, category_id, brand_id, city, condition, price, created_at, updated_at, is_deleted)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(listing.id.as_uuid())
        .bind(listing.owner_user_id)
        .bind(&listing.title)
        .bind(&listing.category_id)
        .bind(&listing.brand_id)
        .bind(&listing.city)
        .bind(&listing.condition)
        .bind(listing.price)
        .bind(listing.created_at)
        .bind(listing.updated_at)
        .bind(listing.is_deleted)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return ListingError::Duplicate(listing.id);
            }
            ListingError::Database(e)
        })?;

        insert_entry(&mut *tx, entry).await?;

        tx.commit().await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, listing, entry), fields(listing_id = %listing.id))]
    async fn update(&self, listing: &Listing, entry: &OutboxEntry) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE listings
            SET title = $2, category_id = $3, brand_id = $4, city = $5, condition = $6,
                price = $7, updated_at = $8, is_deleted = $9
            WHERE id = $1
            "#,
        )
        .bind(listing.id.as_uuid())
        .bind(&listing.title)
        .bind(&listing.category_id)
        .bind(&listing.brand_id)
        .bind(&listing.city)
        .bind(&listing.condition)
        .bind(listing.price)
        .bind(listing.updated_at)
        .bind(listing.is_deleted)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ListingError::NotFound(listing.id));
        }

        insert_entry(&mut *tx, entry).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: AggregateId) -> Result<Option<Listing>> {
        let row = sqlx::query(
            r#"
            SELECT id, owner_user_id, title, category_id, brand_id, city, condition, price, created_at, updated_at, is_deleted
            FROM listings
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_listing).transpose()
    }
}
