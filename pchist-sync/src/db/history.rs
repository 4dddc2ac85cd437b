//! Listening history persistence
//!
//! Raw retrieval and raw append over the `listening_history` table. Deciding
//! which records are new belongs to the reconciler; [`HistoryStore::merge`]
//! only composes the two inside one transaction.
//!
//! Row order is the recency order: ascending `id` means oldest saved first,
//! and every read returns the most recently saved record first.

use crate::services::reconciler;
use chrono::{DateTime, Utc};
use pchist_common::db::models::LISTEN_RECORD_COLUMNS;
use pchist_common::{Error, ListenRecord, Result};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::Span;

/// Bound parameters per `IN (...)` lookup, kept under SQLite's variable limit
const LOOKUP_CHUNK_SIZE: usize = 500;

/// Store handle over the history table
///
/// Events are emitted inside the span handed to [`HistoryStore::new`].
#[derive(Debug, Clone)]
pub struct HistoryStore {
    pool: SqlitePool,
    span: Span,
}

impl HistoryStore {
    pub fn new(pool: SqlitePool, span: Span) -> Self {
        Self { pool, span }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Fail with `StoreUnavailable` unless a round trip to the database works
    #[tracing::instrument(parent = &self.span, skip_all)]
    pub async fn check_available(&self) -> Result<()> {
        if self.pool.is_closed() {
            tracing::error!("History store is closed");
            return Err(Error::StoreUnavailable("connection pool is closed".to_string()));
        }

        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "History store unreachable");
                Error::StoreUnavailable(e.to_string())
            })?;

        Ok(())
    }

    /// Most recently saved records first, at most `limit` of them
    #[tracing::instrument(parent = &self.span, skip_all, fields(limit = limit))]
    pub async fn get_records(&self, limit: usize) -> Result<Vec<ListenRecord>> {
        let query = format!(
            "SELECT {LISTEN_RECORD_COLUMNS} FROM listening_history ORDER BY id DESC LIMIT ?"
        );
        let records: Vec<ListenRecord> = sqlx::query_as(&query)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        tracing::debug!(returned = records.len(), "Loaded recent history");
        Ok(records)
    }

    /// Persisted records whose episode uuid appears in `uuids`
    ///
    /// Most recently saved first. Unknown identifiers are simply absent from
    /// the result.
    #[tracing::instrument(parent = &self.span, skip_all, fields(requested = uuids.len()))]
    pub async fn get_records_by_uuid(&self, uuids: &[&str]) -> Result<Vec<ListenRecord>> {
        let mut conn = self.pool.acquire().await?;
        fetch_by_uuid(&mut *conn, uuids).await
    }

    /// Append `records` in slice order as one transaction
    ///
    /// No filtering happens here. An identifier that is already stored
    /// violates the unique index, and the whole batch is rolled back.
    #[tracing::instrument(parent = &self.span, skip_all, fields(records = records.len()))]
    pub async fn save_records(&self, records: &[ListenRecord]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let saved = append(&mut *tx, records.iter()).await?;
        tx.commit().await?;

        tracing::info!(saved, "Saved listening history records");
        Ok(saved)
    }

    /// Append a newest-first batch so reads reproduce its order
    ///
    /// The batch is written oldest first, giving the newest entry the
    /// highest id and the latest `saved_at`.
    #[tracing::instrument(parent = &self.span, skip_all, fields(records = newest_first.len()))]
    pub async fn persist(&self, newest_first: &[ListenRecord]) -> Result<u64> {
        if newest_first.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let saved = append(&mut *tx, newest_first.iter().rev()).await?;
        tx.commit().await?;

        tracing::info!(saved, "Persisted new listening history records");
        Ok(saved)
    }

    /// Reconcile `incoming` against the store and persist what is new
    ///
    /// Lookup, reconciliation and append share one transaction. Returns the
    /// records that were inserted, newest first.
    #[tracing::instrument(parent = &self.span, skip_all, fields(incoming = incoming.len()))]
    pub async fn merge(&self, incoming: &[ListenRecord]) -> Result<Vec<ListenRecord>> {
        if incoming.is_empty() {
            return Ok(Vec::new());
        }

        let uuids: Vec<&str> = incoming.iter().map(|r| r.episode_uuid.as_str()).collect();

        let mut tx = self.pool.begin().await?;
        let existing = fetch_by_uuid(&mut *tx, &uuids).await?;
        let new_records = reconciler::reconcile(incoming, &existing);

        if new_records.is_empty() {
            tx.rollback().await?;
            tracing::info!(known = existing.len(), "No new listening history");
            return Ok(new_records);
        }

        append(&mut *tx, new_records.iter().rev()).await?;
        tx.commit().await?;

        tracing::info!(
            known = existing.len(),
            inserted = new_records.len(),
            "Merged listening history"
        );
        Ok(new_records)
    }

    pub async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM listening_history")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    /// Keep only the `max_records` most recently saved rows
    ///
    /// Returns the number of rows deleted.
    #[tracing::instrument(parent = &self.span, skip_all, fields(max_records = max_records))]
    pub async fn prune_to(&self, max_records: usize) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM listening_history
            WHERE id NOT IN (
                SELECT id FROM listening_history ORDER BY id DESC LIMIT ?
            )
            "#,
        )
        .bind(i64::try_from(max_records).unwrap_or(i64::MAX))
        .execute(&self.pool)
        .await?;

        let pruned = result.rows_affected();
        if pruned > 0 {
            tracing::info!(pruned, max_records, "Pruned listening history");
        }
        Ok(pruned)
    }
}

/// Look up persisted records by identifier, chunking the `IN (...)` list
async fn fetch_by_uuid(conn: &mut SqliteConnection, uuids: &[&str]) -> Result<Vec<ListenRecord>> {
    let mut records = Vec::new();

    for chunk in uuids.chunks(LOOKUP_CHUNK_SIZE) {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {LISTEN_RECORD_COLUMNS} FROM listening_history WHERE episode_uuid IN ("
        ));
        let mut separated = builder.separated(", ");
        for uuid in chunk {
            separated.push_bind(*uuid);
        }
        separated.push_unseparated(") ORDER BY id DESC");

        let found: Vec<ListenRecord> = builder.build_query_as().fetch_all(&mut *conn).await?;
        records.extend(found);
    }

    // Chunks are each ordered; restore a global newest-first order
    if uuids.len() > LOOKUP_CHUNK_SIZE {
        records.sort_by(|a, b| b.id.cmp(&a.id));
    }

    tracing::debug!(found = records.len(), "Identifier lookup");
    Ok(records)
}

/// Insert `records` in iteration order with strictly increasing `saved_at`
async fn append<'a>(
    conn: &mut SqliteConnection,
    records: impl Iterator<Item = &'a ListenRecord>,
) -> Result<u64> {
    let mut previous: Option<DateTime<Utc>> = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
        "SELECT saved_at FROM listening_history ORDER BY id DESC LIMIT 1",
    )
    .fetch_optional(&mut *conn)
    .await?
    .flatten();

    let mut saved = 0u64;
    for record in records {
        let saved_at = pchist_common::time::next_saved_at(previous);

        sqlx::query(
            r#"
            INSERT INTO listening_history (
                episode_uuid, url, published_date, duration, title, size,
                is_starred, podcast_uuid, podcast_title, author, saved_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.episode_uuid)
        .bind(&record.url)
        .bind(&record.published_date)
        .bind(record.duration)
        .bind(&record.title)
        .bind(record.size)
        .bind(record.is_starred)
        .bind(&record.podcast_uuid)
        .bind(&record.podcast_title)
        .bind(&record.author)
        .bind(saved_at)
        .execute(&mut *conn)
        .await?;

        previous = Some(saved_at);
        saved += 1;
    }

    Ok(saved)
}
