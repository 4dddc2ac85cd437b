//! Integration tests for the Pocket Casts client against a mock API
//!
//! Each failure category must return the empty sentinel and log exactly one
//! ERROR line naming the category.

mod helpers;

use helpers::{capture_logs, episode_json, history_body};
use pchist_sync::config::Credentials;
use pchist_sync::services::pocketcasts_client::{
    AuthToken, ClientSettings, EpisodeUpdate, PocketCastsClient, PocketCastsError,
};
use serde_json::json;
use std::time::Duration;
use tracing::Span;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(base_url: &str) -> PocketCastsClient {
    let settings = ClientSettings {
        api_base_url: base_url.to_string(),
        podcast_api_base_url: base_url.to_string(),
        timeout: Duration::from_secs(5),
    };
    PocketCastsClient::new(settings, Span::none()).unwrap()
}

/// Nothing listens on port 1, so every request fails to connect
fn unreachable_client() -> PocketCastsClient {
    client_for("http://127.0.0.1:1")
}

fn token() -> AuthToken {
    AuthToken::new("test-token")
}

#[tokio::test]
async fn test_login_posts_credentials_and_returns_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/user/login"))
        .and(body_json(json!({
            "email": "listener@example.com",
            "password": "hunter2",
            "scope": "webplayer"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "abc123" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let token = client
        .login(&Credentials::new("listener@example.com", "hunter2"))
        .await
        .unwrap();

    assert_eq!(token.as_str(), "abc123");
}

#[tokio::test]
async fn test_login_without_token_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/user/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "nope" })))
        .mount(&server)
        .await;

    let result = client_for(&server.uri())
        .login(&Credentials::new("a@example.com", "b"))
        .await;

    assert!(matches!(result, Err(PocketCastsError::MissingToken)));
}

#[tokio::test]
async fn test_get_history_success_sends_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/user/history"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(history_body(&["e2", "e1"])))
        .expect(1)
        .mount(&server)
        .await;

    let (logs, _guard) = capture_logs();
    let history = client_for(&server.uri()).get_history(&token()).await;

    assert_eq!(helpers::uuids_of(&history), vec!["e2", "e1"]);
    assert_eq!(history[0].size, 52_428_800);
    assert_eq!(logs.error_count(), 0);
}

#[tokio::test]
async fn test_get_history_network_error_returns_empty() {
    let (logs, _guard) = capture_logs();

    let history = unreachable_client().get_history(&token()).await;

    assert!(history.is_empty());
    logs.assert_error("Network error fetching history");
    assert_eq!(logs.error_count(), 1);
}

#[tokio::test]
async fn test_get_history_malformed_json_returns_empty() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/user/history"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not valid json"))
        .mount(&server)
        .await;

    let (logs, _guard) = capture_logs();
    let history = client_for(&server.uri()).get_history(&token()).await;

    assert!(history.is_empty());
    logs.assert_error("Failed to decode JSON response from history API: not valid json");
    assert_eq!(logs.error_count(), 1);
}

#[tokio::test]
async fn test_get_history_missing_fields_returns_empty() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/user/history"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "episodes": [{ "uuid": "123", "title": "Test Episode" }] })),
        )
        .mount(&server)
        .await;

    let (logs, _guard) = capture_logs();
    let history = client_for(&server.uri()).get_history(&token()).await;

    assert!(history.is_empty());
    logs.assert_error("Failed to decode JSON response from history API");
}

#[tokio::test]
async fn test_get_history_invalid_record_returns_empty() {
    let mut bad = episode_json("e1");
    bad["title"] = json!("");
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/user/history"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "episodes": [episode_json("e2"), bad] })),
        )
        .mount(&server)
        .await;

    let (logs, _guard) = capture_logs();
    let history = client_for(&server.uri()).get_history(&token()).await;

    assert!(history.is_empty());
    logs.assert_error("An unexpected error occurred fetching history");
}

#[tokio::test]
async fn test_get_history_server_error_returns_empty() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/user/history"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let (logs, _guard) = capture_logs();
    let history = client_for(&server.uri()).get_history(&token()).await;

    assert!(history.is_empty());
    logs.assert_error("Unexpected response status 500 fetching history");
}

#[tokio::test]
async fn test_try_get_history_surfaces_typed_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/user/history"))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
        .mount(&server)
        .await;

    let result = client_for(&server.uri()).try_get_history(&token()).await;

    match result {
        Err(PocketCastsError::Status(code, body)) => {
            assert_eq!(code, 401);
            assert_eq!(body, "unauthorized");
        }
        other => panic!("expected Status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_search_podcasts_success_and_first_uuid() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/discover/search"))
        .and(body_json(json!({ "term": "test term" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "podcasts": [
                { "uuid": "p123", "title": "Test Podcast", "author": "Someone" },
                { "uuid": "p456", "title": "Other Podcast" }
            ]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let podcasts = client.search_podcasts(&token(), "test term").await;

    assert_eq!(podcasts.len(), 2);
    assert_eq!(podcasts[1].author, "");
    assert_eq!(
        client.search_first_podcast_uuid(&token(), "test term").await,
        Some("p123".to_string())
    );
}

#[tokio::test]
async fn test_search_first_uuid_without_results() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/discover/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "podcasts": [] })))
        .mount(&server)
        .await;

    let client = client_for(&server.uri());

    assert_eq!(client.search_first_podcast_uuid(&token(), "nothing").await, None);
}

#[tokio::test]
async fn test_search_podcasts_errors_are_logged() {
    let (logs, _guard) = capture_logs();
    assert!(unreachable_client().search_podcasts(&token(), "x").await.is_empty());
    logs.assert_error("Network error searching podcasts");

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/discover/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json at all"))
        .mount(&server)
        .await;

    assert!(client_for(&server.uri()).search_podcasts(&token(), "x").await.is_empty());
    logs.assert_error("Failed to decode JSON response from podcast search API: not json at all");
}

#[tokio::test]
async fn test_get_subscriptions_sends_version_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/user/podcast/list"))
        .and(body_json(json!({ "v": 1 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "podcasts": [{ "uuid": "sub123", "title": "Subscribed Podcast" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let subscriptions = client_for(&server.uri()).get_subscriptions(&token()).await;

    assert_eq!(subscriptions.len(), 1);
    assert_eq!(subscriptions[0].uuid, "sub123");
}

#[tokio::test]
async fn test_get_subscriptions_network_error() {
    let (logs, _guard) = capture_logs();

    assert!(unreachable_client().get_subscriptions(&token()).await.is_empty());
    logs.assert_error("Network error fetching subscriptions");
}

#[tokio::test]
async fn test_add_subscription() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/user/podcast/subscribe"))
        .and(body_json(json!({ "uuid": "uuid_to_add" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
        .mount(&server)
        .await;

    let response = client_for(&server.uri())
        .add_subscription(&token(), "uuid_to_add")
        .await;

    assert_eq!(response, Some(json!({ "status": "ok" })));

    let (logs, _guard) = capture_logs();
    assert!(unreachable_client().add_subscription(&token(), "uuid_to_add").await.is_none());
    logs.assert_error("Network error adding subscription");
}

#[tokio::test]
async fn test_get_episodes_maps_titles_to_uuids() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/podcast/full/pod-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "podcast": {
                "uuid": "pod-1",
                "episodes": [
                    { "uuid": "ep-a", "title": "Alpha" },
                    { "uuid": "ep-b", "title": "Beta" },
                    { "uuid": "ep-c" }
                ]
            }
        })))
        .mount(&server)
        .await;

    let episodes = client_for(&server.uri()).get_episodes(&token(), "pod-1").await;

    assert_eq!(episodes.len(), 2);
    assert_eq!(episodes.get("Alpha").map(String::as_str), Some("ep-a"));
    assert_eq!(episodes.get("Beta").map(String::as_str), Some("ep-b"));
}

#[tokio::test]
async fn test_get_episodes_unexpected_structure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/podcast/full/pod-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "podcast": {} })))
        .mount(&server)
        .await;

    let (logs, _guard) = capture_logs();
    let episodes = client_for(&server.uri()).get_episodes(&token(), "pod-1").await;

    assert!(episodes.is_empty());
    logs.assert_error("Unexpected response structure from get_episodes API");
    assert_eq!(logs.error_count(), 1);
}

#[tokio::test]
async fn test_update_episode_logs_and_posts_update() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sync/update_episode"))
        .and(body_json(json!({ "uuid": "ep-1", "podcast": "pod-1", "status": 3 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let update = EpisodeUpdate {
        uuid: "ep-1".to_string(),
        podcast: "pod-1".to_string(),
        playing_status: Some(3),
        played_up_to: None,
        starred: None,
    };

    let (logs, _guard) = capture_logs();
    let response = client_for(&server.uri()).update_episode(&token(), &update).await;

    assert_eq!(response, Some(json!({})));
    assert!(logs.contains("Updating episode"));
    assert_eq!(logs.error_count(), 0);
}

#[tokio::test]
async fn test_update_episode_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sync/update_episode"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let update = EpisodeUpdate {
        uuid: "ep-1".to_string(),
        podcast: "pod-1".to_string(),
        playing_status: None,
        played_up_to: Some(120),
        starred: None,
    };

    let (logs, _guard) = capture_logs();
    let response = client_for(&server.uri()).update_episode(&token(), &update).await;

    assert!(response.is_none());
    logs.assert_error("Failed to decode JSON response from update_episode API: <html>");
}
