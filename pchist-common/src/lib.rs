//! # pchist Common Library
//!
//! Shared code for the pchist crates including:
//! - Listening-history record model and database row mapping
//! - Pocket Casts payload types (the parse boundary into records)
//! - Configuration loading and data folder resolution
//! - Database initialization
//! - Timestamp utilities

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use api::types::{HistoryEpisode, HistoryResponse};
pub use db::models::{ListenRecord, RecordError};
pub use error::{Error, Result};
