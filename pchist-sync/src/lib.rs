//! pchist-sync library interface
//!
//! Fetches the Pocket Casts listening history and merges new entries into
//! the local SQLite store. Exposed as a library for integration testing.

pub mod config;
pub mod db;
pub mod services;

pub use config::{resolve_credentials, Credentials};
pub use db::history::HistoryStore;
pub use services::history_sync::{sync_history, HistorySource, HistorySync, SyncReport};
pub use services::pocketcasts_client::{ClientSettings, PocketCastsClient, PocketCastsError};
pub use services::reconciler::{reconcile, RetentionPolicy};
