//! Database initialization
//!
//! Opens (or creates) the SQLite database and makes sure the
//! `listening_history` table and its identifier index exist.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Name of the history table
pub const HISTORY_TABLE: &str = "listening_history";

/// Busy timeout applied to every connection
const BUSY_TIMEOUT_MS: u64 = 5000;

/// Initialize database connection and create tables if needed
///
/// A single connection is used: one process owns one store handle and all
/// writes are sequential.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let options = SqliteConnectOptions::from_str(&db_url)?
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS));

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_listening_history_table(&pool).await?;

    Ok(pool)
}

/// Initialize a private in-memory database with the full schema
///
/// The pool holds exactly one connection that is never recycled, since every
/// `:memory:` connection is a separate database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    create_listening_history_table(&pool).await?;

    Ok(pool)
}

/// Create the `listening_history` table and unique identifier index
///
/// Idempotent. `saved_at` defaults to the current time for rows inserted
/// outside the store; the store always supplies its own value.
pub async fn create_listening_history_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS listening_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            episode_uuid TEXT NOT NULL,
            url TEXT NOT NULL,
            published_date TEXT NOT NULL,
            duration INTEGER,
            title TEXT NOT NULL,
            size INTEGER NOT NULL,
            is_starred BOOLEAN DEFAULT 0 CHECK (is_starred IN (0, 1)),
            podcast_uuid TEXT NOT NULL,
            podcast_title TEXT NOT NULL,
            author TEXT NOT NULL,
            saved_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Identifier uniqueness at the storage layer; a racing duplicate insert errors
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_listening_history_episode_uuid \
         ON listening_history(episode_uuid)",
    )
    .execute(pool)
    .await?;

    tracing::debug!("Database tables initialized ({})", HISTORY_TABLE);

    Ok(())
}
