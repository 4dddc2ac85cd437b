//! Listening-history payload types
//!
//! Strict deserialization targets for the `/user/history` response. Every
//! field is required except `duration`, so a payload with missing or
//! mistyped keys fails at the parse boundary instead of leaking loosely
//! shaped maps into reconciliation.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

/// Response body of `POST /user/history`
///
/// # Examples
///
/// ```
/// use pchist_common::api::types::HistoryResponse;
///
/// let body = r#"{"episodes": []}"#;
/// let history: HistoryResponse = serde_json::from_str(body).unwrap();
/// assert!(history.episodes.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct HistoryResponse {
    /// Episodes ordered newest-first, as delivered by the service
    pub episodes: Vec<HistoryEpisode>,
}

impl HistoryResponse {
    /// Empty history, used as the sentinel for transport and parse failures
    pub fn empty() -> Self {
        Self::default()
    }
}

/// One entry of the listening history as received from Pocket Casts
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEpisode {
    /// Episode identifier
    pub uuid: String,
    /// Media URL
    pub url: String,
    /// Publication timestamp (source-defined format)
    pub published: String,
    /// Duration in seconds, if the service knows it
    #[serde(default, deserialize_with = "deserialize_optional_integer")]
    pub duration: Option<i64>,
    /// Episode title
    pub title: String,
    /// Media size in bytes
    #[serde(deserialize_with = "deserialize_integer")]
    pub size: i64,
    /// Starred flag
    pub starred: bool,
    /// Parent podcast identifier
    pub podcast_uuid: String,
    /// Parent podcast title
    pub podcast_title: String,
    /// Podcast author
    pub author: String,
}

/// The service sends some integers as JSON strings ("size": "51200")
#[derive(Deserialize)]
#[serde(untagged)]
enum IntegerOrString {
    Integer(i64),
    Text(String),
}

impl IntegerOrString {
    fn into_i64<E: de::Error>(self) -> Result<i64, E> {
        match self {
            IntegerOrString::Integer(value) => Ok(value),
            IntegerOrString::Text(text) => text
                .trim()
                .parse::<i64>()
                .map_err(|_| E::custom(format!("expected an integer, got {text:?}"))),
        }
    }
}

fn deserialize_integer<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    IntegerOrString::deserialize(deserializer)?.into_i64()
}

fn deserialize_optional_integer<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<IntegerOrString>::deserialize(deserializer)?
        .map(IntegerOrString::into_i64)
        .transpose()
}
