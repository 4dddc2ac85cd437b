//! Database models

use crate::api::types::HistoryEpisode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};
use thiserror::Error;

/// Column list matching the positional layout read by [`ListenRecord::from_row`]
pub const LISTEN_RECORD_COLUMNS: &str = "id, episode_uuid, url, published_date, duration, \
     title, size, is_starred, podcast_uuid, podcast_title, author, saved_at";

/// Validation failures when building a record from an external payload
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("episode uuid is empty")]
    MissingUuid,

    #[error("episode {0} has an empty title")]
    EmptyTitle(String),

    #[error("episode {uuid} has a negative {field}: {value}")]
    Negative {
        uuid: String,
        field: &'static str,
        value: i64,
    },
}

/// One listened episode (row of `listening_history`)
///
/// `id` and `saved_at` are assigned by the store on insert and are `None`
/// for records that have not been persisted yet. Equality compares the ten
/// episode fields only, so a record read back from the database equals the
/// record it was built from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenRecord {
    pub id: Option<i64>,
    pub episode_uuid: String,
    pub url: String,
    pub published_date: String,
    pub duration: Option<i64>,
    pub title: String,
    pub size: i64,
    pub is_starred: bool,
    pub podcast_uuid: String,
    pub podcast_title: String,
    pub author: String,
    pub saved_at: Option<DateTime<Utc>>,
}

impl ListenRecord {
    /// True once the store has assigned an id and persisted-at timestamp
    pub fn is_persisted(&self) -> bool {
        self.id.is_some() && self.saved_at.is_some()
    }
}

impl PartialEq for ListenRecord {
    fn eq(&self, other: &Self) -> bool {
        self.episode_uuid == other.episode_uuid
            && self.url == other.url
            && self.published_date == other.published_date
            && self.duration == other.duration
            && self.title == other.title
            && self.size == other.size
            && self.is_starred == other.is_starred
            && self.podcast_uuid == other.podcast_uuid
            && self.podcast_title == other.podcast_title
            && self.author == other.author
    }
}

impl Eq for ListenRecord {}

impl TryFrom<HistoryEpisode> for ListenRecord {
    type Error = RecordError;

    fn try_from(episode: HistoryEpisode) -> Result<Self, Self::Error> {
        if episode.uuid.trim().is_empty() {
            return Err(RecordError::MissingUuid);
        }
        if episode.title.trim().is_empty() {
            return Err(RecordError::EmptyTitle(episode.uuid));
        }
        if episode.size < 0 {
            return Err(RecordError::Negative {
                uuid: episode.uuid,
                field: "size",
                value: episode.size,
            });
        }
        if let Some(duration) = episode.duration.filter(|d| *d < 0) {
            return Err(RecordError::Negative {
                uuid: episode.uuid,
                field: "duration",
                value: duration,
            });
        }

        Ok(Self {
            id: None,
            episode_uuid: episode.uuid,
            url: episode.url,
            published_date: episode.published,
            duration: episode.duration,
            title: episode.title,
            size: episode.size,
            is_starred: episode.starred,
            podcast_uuid: episode.podcast_uuid,
            podcast_title: episode.podcast_title,
            author: episode.author,
            saved_at: None,
        })
    }
}

// Positional mapping; the SELECT must use LISTEN_RECORD_COLUMNS
impl<'r> FromRow<'r, SqliteRow> for ListenRecord {
    fn from_row(row: &'r SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: Some(row.try_get(0)?),
            episode_uuid: row.try_get(1)?,
            url: row.try_get(2)?,
            published_date: row.try_get(3)?,
            duration: row.try_get(4)?,
            title: row.try_get(5)?,
            size: row.try_get(6)?,
            is_starred: row.try_get(7)?,
            podcast_uuid: row.try_get(8)?,
            podcast_title: row.try_get(9)?,
            author: row.try_get(10)?,
            saved_at: row.try_get(11)?,
        })
    }
}
