use async_trait::async_trait;
use common::AggregateId;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{ListingSearchDocument, Result, SearchIndex};

/// PostgreSQL-backed search index over the `listing_search_documents` table.
#[derive(Clone)]
pub struct PostgresSearchIndex {
    pool: PgPool,
}

impl PostgresSearchIndex {
    /// Creates a new PostgreSQL search index.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_document(row: PgRow) -> Result<ListingSearchDocument> {
        Ok(ListingSearchDocument {
            id: AggregateId::from_uuid(row.try_get::<Uuid, _>("id")?),
            title: row.try_get("title")?,
            category_id: row.try_get("category_id")?,
            brand_id: row.try_get("brand_id")?,
            city: row.try_get("city")?,
            condition: row.try_get("condition")?,
            price: row.try_get("price")?,
            created_at_utc: row.try_get("created_at_utc")?,
            updated_at_utc: row.try_get("updated_at_utc")?,
        })
    }
}

#[async_trait]
impl SearchIndex for PostgresSearchIndex {
    async fn ensure_index(&self) -> Result<()> {
        sqlx::raw_sql(include_str!(
            "../../../migrations/003_create_listing_search_documents.sql"
        ))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, document), fields(listing_id = %document.id))]
    async fn upsert(&self, document: &ListingSearchDocument) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO listing_search_documents (id, title, category_id, brand_id, city, condition, price, created_at_utc, updated_at_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                title = EXCLUDED.title,
                category_id = EXCLUDED.category_id,
                brand_id = EXCLUDED.brand_id,
                city = EXCLUDED.city,
                condition = EXCLUDED.condition,
                price = EXCLUDED.price,
                created_at_utc = EXCLUDED.created_at_utc,
                updated_at_utc = EXCLUDED.updated_at_utc
            "#,
        )
        .bind(document.id.as_uuid())
        .bind(&document.title)
        .bind(&document.category_id)
        .bind(&document.brand_id)
        .bind(&document.city)
        .bind(&document.condition)
        .bind(document.price)
        .bind(document.created_at_utc)
        .bind(document.updated_at_utc)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, id: AggregateId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM listing_search_documents WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get(&self, id: AggregateId) -> Result<Option<ListingSearchDocument>> {
        let row = sqlx::query(
            r#"
            SELECT id, title, category_id, brand_id, city, condition, price, created_at_utc, updated_at_utc
            FROM listing_search_documents
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_document).transpose()
    }

    async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM listing_search_documents")
            .fetch_one(&self.pool)
            .await?;

        Ok(usize::try_from(count).unwrap_or(0))
    }
}
