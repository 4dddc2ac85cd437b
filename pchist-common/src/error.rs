//! Common error types for pchist

use crate::db::models::RecordError;
use thiserror::Error;

/// Common result type for pchist operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across pchist crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// The history store cannot be reached (closed pool, connection failure)
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A history entry failed validation
    #[error("Invalid record: {0}")]
    InvalidRecord(#[from] RecordError),
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            // Connection-level failures mean the store is absent, not that a query was wrong
            sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
                Error::StoreUnavailable(err.to_string())
            }
            other => Error::Database(other),
        }
    }
}

impl Error {
    /// True when the error reports a missing or unreachable store
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Error::StoreUnavailable(_))
    }
}
