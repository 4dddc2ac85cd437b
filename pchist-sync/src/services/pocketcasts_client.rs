//! Pocket Casts web API client
//!
//! Every call has a `try_*` form returning a typed error and a lenient form
//! used by the sync pipeline. The lenient form logs one error line for the
//! failure category and returns an empty result, so callers downstream never
//! see partial or malformed data.

use crate::config::Credentials;
use pchist_common::api::types::HistoryResponse;
use pchist_common::config::{ApiConfig, CompiledDefaults};
use pchist_common::{ListenRecord, RecordError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tracing::Span;

const USER_AGENT: &str = concat!("pchist/", env!("CARGO_PKG_VERSION"));

/// Longest response excerpt copied into error logs
const LOGGED_BODY_LIMIT: usize = 512;

/// Pocket Casts client errors
#[derive(Debug, Error)]
pub enum PocketCastsError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Status(u16, String),

    #[error("Parse error: {message}")]
    Decode { body: String, message: String },

    #[error("Login response did not include a token")]
    MissingToken,

    #[error("Invalid record: {0}")]
    InvalidRecord(#[from] RecordError),

    #[error("Unexpected response structure: {0}")]
    UnexpectedStructure(String),
}

impl From<reqwest::Error> for PocketCastsError {
    fn from(err: reqwest::Error) -> Self {
        PocketCastsError::Network(err.to_string())
    }
}

/// Endpoint locations and transport limits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub api_base_url: String,
    pub podcast_api_base_url: String,
    pub timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        let defaults = CompiledDefaults::for_current_platform();
        Self {
            api_base_url: defaults.api_base_url,
            podcast_api_base_url: defaults.podcast_api_base_url,
            timeout: Duration::from_secs(defaults.request_timeout_secs),
        }
    }
}

impl ClientSettings {
    /// Apply TOML `[api]` overrides on top of the compiled defaults
    pub fn from_config(api: &ApiConfig) -> Self {
        let mut settings = Self::default();
        if let Some(url) = &api.base_url {
            settings.api_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(url) = &api.podcast_base_url {
            settings.podcast_api_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(secs) = api.timeout_secs {
            settings.timeout = Duration::from_secs(secs);
        }
        settings
    }
}

/// Bearer token returned by `/user/login`
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AuthToken(<redacted>)")
    }
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    token: Option<String>,
}

/// Podcast entry from search results or the subscription list
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PodcastSummary {
    pub uuid: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
}

#[derive(Debug, Default, Deserialize)]
struct PodcastListResponse {
    #[serde(default)]
    podcasts: Vec<PodcastSummary>,
}

/// Body of `POST /sync/update_episode`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EpisodeUpdate {
    pub uuid: String,
    pub podcast: String,
    /// Playing status (3 = played)
    #[serde(rename = "status", skip_serializing_if = "Option::is_none")]
    pub playing_status: Option<u8>,
    /// Playback position in seconds
    #[serde(rename = "position", skip_serializing_if = "Option::is_none")]
    pub played_up_to: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starred: Option<bool>,
}

/// Names used in the per-category failure log lines
#[derive(Debug, Clone, Copy)]
struct Operation {
    /// "Network error {action}"
    action: &'static str,
    /// "Failed to decode JSON response from {api}"
    api: &'static str,
}

const FETCH_HISTORY: Operation = Operation {
    action: "fetching history",
    api: "history API",
};
const SEARCH_PODCASTS: Operation = Operation {
    action: "searching podcasts",
    api: "podcast search API",
};
const FETCH_SUBSCRIPTIONS: Operation = Operation {
    action: "fetching subscriptions",
    api: "subscriptions API",
};
const ADD_SUBSCRIPTION: Operation = Operation {
    action: "adding subscription",
    api: "add subscription API",
};
const FETCH_EPISODES: Operation = Operation {
    action: "fetching episodes",
    api: "get_episodes API",
};
const UPDATE_EPISODE: Operation = Operation {
    action: "updating podcast episode",
    api: "update_episode API",
};

/// Parse a `/user/history` body into validated records
///
/// Used for both live responses and sample files. One invalid entry rejects
/// the whole payload.
pub fn parse_history_payload(body: &[u8]) -> Result<Vec<ListenRecord>, PocketCastsError> {
    let response: HistoryResponse =
        serde_json::from_slice(body).map_err(|e| PocketCastsError::Decode {
            body: String::from_utf8_lossy(body).into_owned(),
            message: e.to_string(),
        })?;

    let records = response
        .episodes
        .into_iter()
        .map(ListenRecord::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(records)
}

/// Pocket Casts API client
///
/// Events are emitted inside the span handed to [`PocketCastsClient::new`].
pub struct PocketCastsClient {
    http_client: reqwest::Client,
    settings: ClientSettings,
    span: Span,
}

impl PocketCastsClient {
    pub fn new(settings: ClientSettings, span: Span) -> Result<Self, PocketCastsError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(settings.timeout)
            .build()
            .map_err(|e| PocketCastsError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            settings,
            span,
        })
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.settings.api_base_url, path)
    }

    /// Exchange credentials for a bearer token
    #[tracing::instrument(parent = &self.span, skip_all)]
    pub async fn login(&self, credentials: &Credentials) -> Result<AuthToken, PocketCastsError> {
        let request = self
            .http_client
            .post(self.api_url("/user/login"))
            .json(&json!({
                "email": credentials.username,
                "password": credentials.password,
                "scope": "webplayer",
            }));

        let body = self.send(request).await?;
        let login: LoginResponse = decode(&body)?;

        match login.token.filter(|t| !t.trim().is_empty()) {
            Some(token) => {
                tracing::debug!("Logged in to Pocket Casts");
                Ok(AuthToken::new(token))
            }
            None => Err(PocketCastsError::MissingToken),
        }
    }

    /// Listening history, newest first
    #[tracing::instrument(parent = &self.span, skip_all)]
    pub async fn try_get_history(
        &self,
        token: &AuthToken,
    ) -> Result<Vec<ListenRecord>, PocketCastsError> {
        let request = self
            .http_client
            .post(self.api_url("/user/history"))
            .bearer_auth(token.as_str());

        let body = self.send(request).await?;
        let records = parse_history_payload(body.as_bytes())?;

        tracing::debug!(episodes = records.len(), "Fetched listening history");
        Ok(records)
    }

    /// Listening history, or an empty history after logging the failure
    pub async fn get_history(&self, token: &AuthToken) -> Vec<ListenRecord> {
        match self.try_get_history(token).await {
            Ok(records) => records,
            Err(e) => {
                self.log_failure(FETCH_HISTORY, &e);
                Vec::new()
            }
        }
    }

    #[tracing::instrument(parent = &self.span, skip_all, fields(term = %term))]
    pub async fn try_search_podcasts(
        &self,
        token: &AuthToken,
        term: &str,
    ) -> Result<Vec<PodcastSummary>, PocketCastsError> {
        let request = self
            .http_client
            .post(self.api_url("/discover/search"))
            .bearer_auth(token.as_str())
            .json(&json!({ "term": term }));

        let body = self.send(request).await?;
        let response: PodcastListResponse = decode(&body)?;
        Ok(response.podcasts)
    }

    /// Podcasts matching `term`; empty on failure
    pub async fn search_podcasts(&self, token: &AuthToken, term: &str) -> Vec<PodcastSummary> {
        match self.try_search_podcasts(token, term).await {
            Ok(podcasts) => podcasts,
            Err(e) => {
                self.log_failure(SEARCH_PODCASTS, &e);
                Vec::new()
            }
        }
    }

    /// Identifier of the first search hit
    pub async fn search_first_podcast_uuid(&self, token: &AuthToken, term: &str) -> Option<String> {
        self.search_podcasts(token, term)
            .await
            .into_iter()
            .next()
            .map(|podcast| podcast.uuid)
    }

    #[tracing::instrument(parent = &self.span, skip_all)]
    pub async fn try_get_subscriptions(
        &self,
        token: &AuthToken,
    ) -> Result<Vec<PodcastSummary>, PocketCastsError> {
        let request = self
            .http_client
            .post(self.api_url("/user/podcast/list"))
            .bearer_auth(token.as_str())
            .json(&json!({ "v": 1 }));

        let body = self.send(request).await?;
        let response: PodcastListResponse = decode(&body)?;
        Ok(response.podcasts)
    }

    /// Subscribed podcasts; empty on failure
    pub async fn get_subscriptions(&self, token: &AuthToken) -> Vec<PodcastSummary> {
        match self.try_get_subscriptions(token).await {
            Ok(podcasts) => podcasts,
            Err(e) => {
                self.log_failure(FETCH_SUBSCRIPTIONS, &e);
                Vec::new()
            }
        }
    }

    #[tracing::instrument(parent = &self.span, skip_all, fields(podcast = %podcast_uuid))]
    pub async fn try_add_subscription(
        &self,
        token: &AuthToken,
        podcast_uuid: &str,
    ) -> Result<Value, PocketCastsError> {
        let request = self
            .http_client
            .post(self.api_url("/user/podcast/subscribe"))
            .bearer_auth(token.as_str())
            .json(&json!({ "uuid": podcast_uuid }));

        let body = self.send(request).await?;
        decode(&body)
    }

    /// Subscribe to a podcast; `None` on failure
    pub async fn add_subscription(&self, token: &AuthToken, podcast_uuid: &str) -> Option<Value> {
        match self.try_add_subscription(token, podcast_uuid).await {
            Ok(value) => Some(value),
            Err(e) => {
                self.log_failure(ADD_SUBSCRIPTION, &e);
                None
            }
        }
    }

    /// Episode title to episode uuid for one podcast
    #[tracing::instrument(parent = &self.span, skip_all, fields(podcast = %podcast_uuid))]
    pub async fn try_get_episodes(
        &self,
        token: &AuthToken,
        podcast_uuid: &str,
    ) -> Result<BTreeMap<String, String>, PocketCastsError> {
        let url = format!(
            "{}/podcast/full/{}",
            self.settings.podcast_api_base_url, podcast_uuid
        );
        let request = self.http_client.get(url).bearer_auth(token.as_str());

        let body = self.send(request).await?;
        let data: Value = decode(&body)?;

        let episodes = data
            .get("podcast")
            .and_then(|podcast| podcast.get("episodes"))
            .and_then(Value::as_array)
            .ok_or_else(|| PocketCastsError::UnexpectedStructure(data.to_string()))?;

        let mut by_title = BTreeMap::new();
        for episode in episodes {
            let title = episode.get("title").and_then(Value::as_str);
            let uuid = episode.get("uuid").and_then(Value::as_str);
            match (title, uuid) {
                (Some(title), Some(uuid)) => {
                    by_title.insert(title.to_string(), uuid.to_string());
                }
                _ => tracing::debug!("Skipping episode without title or uuid"),
            }
        }

        Ok(by_title)
    }

    /// Episode map for a podcast; empty on failure
    pub async fn get_episodes(
        &self,
        token: &AuthToken,
        podcast_uuid: &str,
    ) -> BTreeMap<String, String> {
        match self.try_get_episodes(token, podcast_uuid).await {
            Ok(episodes) => episodes,
            Err(e) => {
                self.log_failure(FETCH_EPISODES, &e);
                BTreeMap::new()
            }
        }
    }

    #[tracing::instrument(parent = &self.span, skip_all, fields(episode = %update.uuid))]
    pub async fn try_update_episode(
        &self,
        token: &AuthToken,
        update: &EpisodeUpdate,
    ) -> Result<Value, PocketCastsError> {
        tracing::info!("Updating episode: {:?}", update);

        let request = self
            .http_client
            .post(self.api_url("/sync/update_episode"))
            .bearer_auth(token.as_str())
            .json(update);

        let body = self.send(request).await?;
        decode(&body)
    }

    /// Push an episode state change; `None` on failure
    pub async fn update_episode(&self, token: &AuthToken, update: &EpisodeUpdate) -> Option<Value> {
        match self.try_update_episode(token, update).await {
            Ok(value) => Some(value),
            Err(e) => {
                self.log_failure(UPDATE_EPISODE, &e);
                None
            }
        }
    }

    /// Send a request and return the body of a 2xx response
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<String, PocketCastsError> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PocketCastsError::Status(status.as_u16(), error_text));
        }

        Ok(response.text().await?)
    }

    fn log_failure(&self, operation: Operation, error: &PocketCastsError) {
        let _entered = self.span.enter();
        match error {
            PocketCastsError::Network(message) => {
                tracing::error!("Network error {}: {}", operation.action, message);
            }
            PocketCastsError::Decode { body, .. } => {
                tracing::error!(
                    "Failed to decode JSON response from {}: {}",
                    operation.api,
                    excerpt(body)
                );
            }
            PocketCastsError::Status(code, body) => {
                tracing::error!(
                    "Unexpected response status {} {}: {}",
                    code,
                    operation.action,
                    excerpt(body)
                );
            }
            PocketCastsError::UnexpectedStructure(data) => {
                tracing::error!(
                    "Unexpected response structure from {}: {}",
                    operation.api,
                    excerpt(data)
                );
            }
            PocketCastsError::InvalidRecord(_) | PocketCastsError::MissingToken => {
                tracing::error!("An unexpected error occurred {}: {}", operation.action, error);
            }
        }
    }
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, PocketCastsError> {
    serde_json::from_str(body).map_err(|e| PocketCastsError::Decode {
        body: body.to_string(),
        message: e.to_string(),
    })
}

fn excerpt(body: &str) -> &str {
    match body.char_indices().nth(LOGGED_BODY_LIMIT) {
        Some((end, _)) => &body[..end],
        None => body,
    }
}
