//! Shared test data: history payloads, records and in-memory stores

use pchist_common::{HistoryEpisode, ListenRecord};
use pchist_sync::HistoryStore;
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::Span;

/// One `/user/history` episode as the service sends it (size as a string)
pub fn episode_json(uuid: &str) -> Value {
    json!({
        "uuid": uuid,
        "url": format!("https://cdn.example.com/{uuid}.mp3"),
        "published": "2024-03-01T10:00:00Z",
        "duration": 1800,
        "title": format!("Episode {uuid}"),
        "size": "52428800",
        "starred": false,
        "podcastUuid": "pod-1",
        "podcastTitle": "The Podcast",
        "author": "Someone"
    })
}

/// `{"episodes": [...]}` body, newest first in the given order
pub fn history_body(uuids: &[&str]) -> Value {
    json!({ "episodes": uuids.iter().map(|u| episode_json(u)).collect::<Vec<_>>() })
}

pub fn record(uuid: &str) -> ListenRecord {
    let episode: HistoryEpisode = serde_json::from_value(episode_json(uuid)).unwrap();
    ListenRecord::try_from(episode).unwrap()
}

pub fn records(uuids: &[&str]) -> Vec<ListenRecord> {
    uuids.iter().map(|u| record(u)).collect()
}

pub fn uuids_of(records: &[ListenRecord]) -> Vec<String> {
    records.iter().map(|r| r.episode_uuid.clone()).collect()
}

/// Store over a private in-memory database
pub async fn memory_store() -> HistoryStore {
    let pool = pchist_common::db::init_memory_database()
        .await
        .expect("Failed to create in-memory database");
    HistoryStore::new(pool, Span::none())
}

/// Stored identifiers, most recently saved first
pub async fn stored_uuids(store: &HistoryStore) -> Vec<String> {
    uuids_of(&store.get_records(10_000).await.unwrap())
}

/// Path of a file under tests/fixtures
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}
