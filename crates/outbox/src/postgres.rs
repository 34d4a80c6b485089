use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    OutboxEntry, OutboxEntryId, OutboxError, Result,
    store::{OutboxStore, validate_outcomes},
};

/// PostgreSQL-backed outbox store over the `outbox_messages` table.
#[derive(Clone)]
pub struct PostgresOutboxStore {
    pool: PgPool,
}

impl PostgresOutboxStore {
    /// Creates a new PostgreSQL outbox store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_entry(row: PgRow) -> Result<OutboxEntry> {
        Ok(OutboxEntry {
            id: OutboxEntryId::from_uuid(row.try_get::<Uuid, _>("id")?),
            occurred_at: row.try_get("occurred_at")?,
            event_type: row.try_get("event_type")?,
            payload: row.try_get("payload")?,
            published_at: row.try_get("published_at")?,
            attempts: row.try_get("attempts")?,
            last_error: row.try_get("last_error")?,
        })
    }
}

/// Inserts an entry on an existing connection.
///
/// Business stores call this inside their own transaction so the state
/// change and its outbox entry commit or roll back together.
pub async fn insert_entry(conn: &mut PgConnection, entry: &OutboxEntry) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO outbox_messages (id, occurred_at, event_type, payload, published_at, attempts, last_error)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(entry.id.as_uuid())
    .bind(entry.occurred_at)
    .bind(&entry.event_type)
    .bind(&entry.payload)
    .bind(entry.published_at)
    .bind(entry.attempts)
    .bind(&entry.last_error)
    .execute(conn)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return OutboxError::DuplicateEntry(entry.id);
        }
        OutboxError::Database(e)
    })?;

    Ok(())
}

#[async_trait]
impl OutboxStore for PostgresOutboxStore {
    async fn enqueue(&self, entry: OutboxEntry) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        insert_entry(&mut conn, &entry).await
    }

    async fn fetch_pending(&self, limit: usize) -> Result<Vec<OutboxEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, occurred_at, event_type, payload, published_at, attempts, last_error
            FROM outbox_messages
            WHERE published_at IS NULL
            ORDER BY occurred_at ASC
            LIMIT $1
            "#,
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_entry).collect()
    }

    async fn save_outcomes(&self, entries: &[OutboxEntry]) -> Result<()> {
        validate_outcomes(entries)?;
        if entries.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for entry in entries {
            let result = sqlx::query(
                r#"
                UPDATE outbox_messages
                SET published_at = $2,
                    attempts = GREATEST(attempts, $3),
                    last_error = $4
                WHERE id = $1
                "#,
            )
            .bind(entry.id.as_uuid())
            .bind(entry.published_at)
            .bind(entry.attempts)
            .bind(&entry.last_error)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                // Dropping the transaction rolls back the rows already updated.
                return Err(OutboxError::EntryNotFound(entry.id));
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: OutboxEntryId) -> Result<Option<OutboxEntry>> {
        let row = sqlx::query(
            r#"
            SELECT id, occurred_at, event_type, payload, published_at, attempts, last_error
            FROM outbox_messages
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_entry).transpose()
    }
}
