//! Database access for pchist-sync

pub mod history;

pub use history::HistoryStore;

use pchist_common::Result;
use std::path::Path;
use tracing::Span;

/// Open the on-disk database and wrap it in a store
pub async fn open_store(db_path: &Path, span: Span) -> Result<HistoryStore> {
    let pool = pchist_common::db::init_database(db_path).await?;
    Ok(HistoryStore::new(pool, span))
}
