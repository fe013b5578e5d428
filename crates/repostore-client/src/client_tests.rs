//! Repository client tests against a scripted transport.

use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::json;

use crate::client::{FetchOptions, RepoClient, SaveOptions};
use crate::codec;
use crate::config::StoreConfig;
use crate::credentials::MemoryCredentialStore;
use crate::error::{StoreError, StoreResult};
use crate::events::RecordingSink;
use crate::rate_limit::{HEADER_REMAINING, HEADER_RESET};
use crate::test_support::ScriptedTransport;
use crate::transport::{StoreRequest, StoreResponse};
use repostore_models::{ChangeKind, FileContent, StoreEvent};

const REPO: &str = "acme/graphs";

async fn client_with(
    script: Vec<StoreResult<StoreResponse>>,
    token: Option<&str>,
) -> (RepoClient, Arc<ScriptedTransport>, RecordingSink) {
    let mut config = StoreConfig::new(REPO);
    config.token = token.map(str::to_string);
    build(config, script).await
}

async fn build(
    config: StoreConfig,
    script: Vec<StoreResult<StoreResponse>>,
) -> (RepoClient, Arc<ScriptedTransport>, RecordingSink) {
    let transport = Arc::new(ScriptedTransport::new(script));
    let sink = RecordingSink::new();
    let client = RepoClient::builder(config)
        .transport(transport.clone())
        .sink(Arc::new(sink.clone()))
        .build()
        .await
        .unwrap();
    (client, transport, sink)
}

fn envelope(content: &FileContent, sha: &str) -> StoreResult<StoreResponse> {
    let body = json!({
        "content": codec::encode_content(content).unwrap(),
        "sha": sha,
        "path": "graph.json",
        "encoding": "base64",
    });
    Ok(StoreResponse::new(200, body.to_string()))
}

fn not_found() -> StoreResult<StoreResponse> {
    Ok(StoreResponse::new(404, r#"{"message": "Not Found"}"#))
}

fn written(commit: &str) -> StoreResult<StoreResponse> {
    let body = json!({
        "content": { "sha": "blob-sha", "path": "graph.json" },
        "commit": { "sha": commit },
    });
    Ok(StoreResponse::new(201, body.to_string()))
}

fn header<'a>(request: &'a StoreRequest, name: &str) -> Option<&'a str> {
    request
        .headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

fn graph(version: u64) -> FileContent {
    FileContent::Json(json!({ "version": version, "nodes": [] }))
}

// =============================================================================
// Reads
// =============================================================================

#[tokio::test]
async fn test_fetch_within_ttl_hits_network_once() {
    let (client, transport, _) = client_with(vec![envelope(&graph(1), "s1")], None).await;

    let first = client.fetch_file("graph.json", FetchOptions::default()).await.unwrap();
    let second = client.fetch_file("graph.json", FetchOptions::default()).await.unwrap();

    assert_eq!(first, Some(graph(1)));
    assert_eq!(second, Some(graph(1)));
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn test_force_fresh_always_hits_network() {
    let (client, transport, _) = client_with(
        vec![envelope(&graph(1), "s1"), envelope(&graph(2), "s2")],
        None,
    )
    .await;

    client.fetch_file("graph.json", FetchOptions::fresh()).await.unwrap();
    let latest = client.fetch_file("graph.json", FetchOptions::fresh()).await.unwrap();

    assert_eq!(latest, Some(graph(2)));
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn test_fetch_builds_contents_url() {
    let (client, transport, _) = client_with(vec![not_found()], None).await;

    let result = client
        .fetch_file("data/my graph.json", FetchOptions::default())
        .await
        .unwrap();

    assert!(result.is_none());
    assert_eq!(
        transport.call_urls(),
        vec![format!(
            "https://api.github.com/repos/{}/contents/data/my%20graph.json?ref=main",
            REPO
        )]
    );
}

#[tokio::test]
async fn test_fetch_missing_file_is_not_cached() {
    let (client, transport, _) =
        client_with(vec![not_found(), envelope(&graph(1), "s1")], None).await;

    assert!(client
        .fetch_file("graph.json", FetchOptions::default())
        .await
        .unwrap()
        .is_none());
    assert_eq!(
        client.fetch_file("graph.json", FetchOptions::default()).await.unwrap(),
        Some(graph(1))
    );
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn test_fetch_plain_text_file() {
    let text = FileContent::Text("# Notes\n".to_string());
    let (client, _, _) = client_with(vec![envelope(&text, "s1")], None).await;

    let content = client
        .fetch_file("NOTES.md", FetchOptions::uncached())
        .await
        .unwrap();
    assert_eq!(content.as_ref().and_then(FileContent::as_text), Some("# Notes\n"));
}

#[tokio::test]
async fn test_fetch_server_error_carries_status_and_message() {
    let mut config = StoreConfig::new(REPO);
    config.retry.max_retries = 0;
    let (client, _, sink) = build(
        config,
        vec![Ok(StoreResponse::new(418, r#"{"message": "teapot"}"#))],
    )
    .await;

    let err = client
        .fetch_file("graph.json", FetchOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.http_status(), Some(418));
    assert!(err.to_string().contains("teapot"));
    assert_eq!(sink.topics(), vec!["file.read_error", "operation.failed"]);
}

#[tokio::test]
async fn test_undecodable_content_publishes_read_error() {
    let body = json!({ "content": "%%%not base64%%%", "sha": "s1", "path": "graph.json" });
    let (client, _, sink) =
        client_with(vec![Ok(StoreResponse::new(200, body.to_string()))], None).await;

    let err = client
        .fetch_file("graph.json", FetchOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::Codec(_)));
    assert!(sink.topics().contains(&"file.read_error"));
}

#[tokio::test]
async fn test_missing_repository_fails_without_network() {
    let (client, transport, _) = build(StoreConfig::default(), vec![]).await;

    let err = client
        .fetch_file("graph.json", FetchOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::Config(_)));
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn test_auth_failure_is_published() {
    let (client, _, sink) = client_with(
        vec![Ok(StoreResponse::new(401, r#"{"message": "Bad credentials"}"#))],
        Some("ghp_revoked"),
    )
    .await;

    let err = client
        .fetch_file("graph.json", FetchOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::AuthFailed { status: 401, .. }));
    assert!(sink.topics().contains(&"auth.failed"));
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_quota_surfaces_as_rate_limited() {
    let reset = Utc::now() + chrono::Duration::hours(1);
    let forbidden = || {
        Ok(StoreResponse::new(403, r#"{"message": "Forbidden"}"#)
            .with_header(HEADER_REMAINING, "0")
            .with_header(HEADER_RESET, reset.timestamp().to_string()))
    };
    let mut config = StoreConfig::new(REPO);
    config.retry.base_delay_ms = 100;
    let (client, transport, _) = build(config, (0..4).map(|_| forbidden()).collect()).await;

    let err = client
        .fetch_file("graph.json", FetchOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::RateLimited(_)));
    assert_eq!(err.http_status(), Some(403));
    assert_eq!(transport.call_count(), 4);
}

#[tokio::test]
async fn test_forbidden_with_quota_left_is_not_rate_limited() {
    let response = StoreResponse::new(403, r#"{"message": "Resource not accessible"}"#)
        .with_header(HEADER_REMAINING, "4000");
    let (client, _, _) = client_with(vec![Ok(response)], None).await;

    let err = client
        .fetch_file("graph.json", FetchOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::Api { status: 403, .. }));
}

#[tokio::test]
async fn test_leading_slash_shares_cache_entry() {
    let (client, transport, _) = client_with(
        vec![
            envelope(&graph(1), "s1"),
            envelope(&graph(1), "s1"),
            written("c2"),
            envelope(&graph(2), "s2"),
        ],
        Some("ghp_x"),
    )
    .await;

    client.fetch_file("/graph.json", FetchOptions::default()).await.unwrap();
    client
        .save_file("graph.json", &graph(2), "Update", SaveOptions::default())
        .await
        .unwrap();
    let after = client.fetch_file("/graph.json", FetchOptions::default()).await.unwrap();

    assert_eq!(after, Some(graph(2)));
    assert_eq!(transport.call_count(), 4);
}

// =============================================================================
// Credentials
// =============================================================================

#[tokio::test]
async fn test_requests_carry_credential_and_accept_headers() {
    let (client, transport, _) = client_with(vec![not_found()], Some("ghp_secret")).await;

    client.fetch_file("graph.json", FetchOptions::default()).await.unwrap();

    let requests = transport.requests();
    assert_eq!(header(&requests[0], "Authorization"), Some("token ghp_secret"));
    assert_eq!(
        header(&requests[0], "Accept"),
        Some("application/vnd.github.v3+json")
    );
}

#[tokio::test]
async fn test_anonymous_reads_send_no_authorization() {
    let (client, transport, _) = client_with(vec![not_found()], None).await;

    client.fetch_file("graph.json", FetchOptions::default()).await.unwrap();

    assert!(header(&transport.requests()[0], "Authorization").is_none());
}

#[tokio::test]
async fn test_credential_loaded_from_store() {
    let transport = Arc::new(ScriptedTransport::new(vec![not_found()]));
    let client = RepoClient::builder(StoreConfig::new(REPO))
        .transport(transport.clone())
        .sink(Arc::new(RecordingSink::new()))
        .credentials(Arc::new(MemoryCredentialStore::with_credential("ghp_stored")))
        .build()
        .await
        .unwrap();

    assert!(client.has_credential().await);
    client.fetch_file("graph.json", FetchOptions::default()).await.unwrap();
    assert_eq!(
        header(&transport.requests()[0], "Authorization"),
        Some("token ghp_stored")
    );
}

#[tokio::test]
async fn test_set_and_clear_credential() {
    let (client, _, _) = client_with(vec![], None).await;
    assert!(!client.has_credential().await);

    client.set_credential("ghp_new").await.unwrap();
    assert!(client.has_credential().await);

    client.clear_credential().await.unwrap();
    assert!(!client.has_credential().await);
}

// =============================================================================
// Writes
// =============================================================================

#[tokio::test]
async fn test_save_without_credential_fails_fast() {
    let (client, transport, sink) = client_with(vec![], None).await;

    let err = client
        .save_file("graph.json", &graph(1), "Update", SaveOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::Unauthorized(_)));
    assert_eq!(transport.call_count(), 0);
    assert_eq!(sink.topics(), vec!["operation.unauthorized"]);
}

#[tokio::test]
async fn test_delete_without_credential_fails_fast() {
    let (client, transport, sink) = client_with(vec![], None).await;

    let err = client
        .delete_file("graph.json", "Remove", SaveOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::Unauthorized(_)));
    assert_eq!(transport.call_count(), 0);
    assert_eq!(sink.topics(), vec!["operation.unauthorized"]);
}

#[tokio::test]
async fn test_save_new_file_omits_sha() {
    let (client, transport, sink) =
        client_with(vec![not_found(), written("c1")], Some("ghp_x")).await;

    let result = client
        .save_file("graph.json", &graph(1), "Create graph", SaveOptions::default())
        .await
        .unwrap();

    assert_eq!(result.commit_sha, "c1");
    assert!(!result.is_update);

    let requests = transport.requests();
    assert_eq!(requests[1].method, Method::PUT);
    let body = requests[1].body.clone().unwrap();
    assert_eq!(body["message"], "Create graph");
    assert_eq!(body["branch"], "main");
    assert!(body.get("sha").is_none());
    assert_eq!(
        codec::decode_content(body["content"].as_str().unwrap()).unwrap(),
        graph(1)
    );
    assert_eq!(sink.topics(), vec!["file.saved"]);
}

#[tokio::test]
async fn test_save_existing_file_sends_current_sha() {
    let (client, transport, _) =
        client_with(vec![envelope(&graph(1), "old-sha"), written("c2")], Some("ghp_x")).await;

    let result = client
        .save_file("graph.json", &graph(2), "Update graph", SaveOptions::default())
        .await
        .unwrap();

    assert!(result.is_update);
    assert_eq!(transport.requests()[1].body.clone().unwrap()["sha"], "old-sha");
}

#[tokio::test]
async fn test_fetch_after_save_is_not_stale() {
    let (client, transport, _) = client_with(
        vec![
            envelope(&graph(1), "s1"),
            envelope(&graph(1), "s1"),
            written("c2"),
            envelope(&graph(2), "s2"),
        ],
        Some("ghp_x"),
    )
    .await;

    client.fetch_file("graph.json", FetchOptions::default()).await.unwrap();
    client
        .save_file("graph.json", &graph(2), "Update", SaveOptions::default())
        .await
        .unwrap();
    let after = client.fetch_file("graph.json", FetchOptions::default()).await.unwrap();

    assert_eq!(after, Some(graph(2)));
    assert_eq!(transport.call_count(), 4);
}

#[tokio::test]
async fn test_save_with_clear_cache_drops_other_entries() {
    let (client, transport, _) = client_with(
        vec![
            envelope(&graph(1), "s1"),
            not_found(),
            written("c1"),
            envelope(&graph(1), "s1"),
        ],
        Some("ghp_x"),
    )
    .await;

    client.fetch_file("other.json", FetchOptions::default()).await.unwrap();
    client
        .save_file("graph.json", &graph(1), "Create", SaveOptions { clear_cache: true })
        .await
        .unwrap();
    client.fetch_file("other.json", FetchOptions::default()).await.unwrap();

    assert_eq!(transport.call_count(), 4);
}

#[tokio::test]
async fn test_stale_sha_surfaces_as_conflict() {
    let (client, _, sink) = client_with(
        vec![
            envelope(&graph(1), "s1"),
            Ok(StoreResponse::new(
                409,
                r#"{"message": "graph.json does not match s1"}"#,
            )),
        ],
        Some("ghp_x"),
    )
    .await;

    let err = client
        .save_file("graph.json", &graph(2), "Update", SaveOptions::default())
        .await
        .unwrap_err();

    assert!(err.is_conflict());
    assert!(err.to_string().contains("does not match"));
    assert_eq!(sink.topics(), vec!["operation.failed"]);
}

#[tokio::test]
async fn test_unprocessable_write_is_conflict() {
    let (client, _, _) = client_with(
        vec![
            not_found(),
            Ok(StoreResponse::new(422, r#"{"message": "sha wasn't supplied"}"#)),
        ],
        Some("ghp_x"),
    )
    .await;

    let err = client
        .save_file("graph.json", &graph(1), "Create", SaveOptions::default())
        .await
        .unwrap_err();

    assert!(err.is_conflict());
    assert!(err.to_string().contains("sha wasn't supplied"));
}

#[tokio::test]
async fn test_delete_missing_file_sends_no_delete() {
    let (client, transport, _) = client_with(vec![not_found()], Some("ghp_x")).await;

    let result = client
        .delete_file("graph.json", "Remove", SaveOptions::default())
        .await
        .unwrap();

    assert!(!result.deleted);
    assert!(result.commit_sha.is_none());
    assert_eq!(transport.call_count(), 1);
    assert_eq!(transport.requests()[0].method, Method::GET);
}

#[tokio::test]
async fn test_delete_existing_file() {
    let deleted = json!({ "content": null, "commit": { "sha": "c3" } });
    let (client, transport, sink) = client_with(
        vec![
            envelope(&graph(1), "s1"),
            Ok(StoreResponse::new(200, deleted.to_string())),
        ],
        Some("ghp_x"),
    )
    .await;

    let result = client
        .delete_file("graph.json", "Remove graph", SaveOptions::default())
        .await
        .unwrap();

    assert!(result.deleted);
    assert_eq!(result.commit_sha.as_deref(), Some("c3"));

    let requests = transport.requests();
    assert_eq!(requests[1].method, Method::DELETE);
    assert_eq!(requests[1].body.clone().unwrap()["sha"], "s1");
    assert_eq!(sink.topics(), vec!["file.deleted"]);
}

// =============================================================================
// History and Revisions
// =============================================================================

#[tokio::test]
async fn test_history_of_unknown_path_is_empty() {
    let (client, _, _) = client_with(vec![not_found()], None).await;
    assert!(client.get_file_history("graph.json").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_history_maps_commits() {
    let body = json!([
        {
            "sha": "c2",
            "html_url": "https://github.com/acme/graphs/commit/c2",
            "commit": {
                "message": "Update graph",
                "author": {
                    "name": "Ada",
                    "email": "ada@example.com",
                    "date": "2024-05-01T10:00:00Z"
                }
            }
        },
        {
            "sha": "c1",
            "html_url": "https://github.com/acme/graphs/commit/c1",
            "commit": { "message": "Create graph", "author": null }
        }
    ]);
    let (client, transport, _) =
        client_with(vec![Ok(StoreResponse::new(200, body.to_string()))], None).await;

    let history = client.get_file_history("data/graph.json").await.unwrap();

    assert_eq!(history.len(), 2);
    assert_eq!(history[0].sha, "c2");
    assert_eq!(history[0].author.name, "Ada");
    assert_eq!(history[1].message, "Create graph");
    assert_eq!(
        transport.call_urls()[0],
        format!(
            "https://api.github.com/repos/{}/commits?path=data%2Fgraph.json&sha=main",
            REPO
        )
    );
}

#[tokio::test]
async fn test_revision_reads_bypass_cache() {
    let (client, transport, _) = client_with(
        vec![envelope(&graph(1), "s1"), envelope(&graph(1), "s1")],
        None,
    )
    .await;

    client.get_file_at_revision("graph.json", "abc123").await.unwrap();
    client.get_file_at_revision("graph.json", "abc123").await.unwrap();

    assert_eq!(transport.call_count(), 2);
    assert!(transport.call_urls()[0].ends_with("?ref=abc123"));
}

#[tokio::test]
async fn test_diff_of_added_file() {
    let (client, _, _) =
        client_with(vec![not_found(), envelope(&graph(1), "s1")], None).await;

    let diff = client.get_diff("graph.json", "r1", "r2").await.unwrap();

    assert!(diff.has_changed);
    assert_eq!(diff.changes.len(), 1);
    assert_eq!(diff.changes[0].kind, ChangeKind::Added);
    assert_eq!(diff.changes[0].after, Some(graph(1)));
}

#[tokio::test]
async fn test_diff_of_identical_content() {
    let (client, _, _) = client_with(
        vec![envelope(&graph(1), "s1"), envelope(&graph(1), "s1")],
        None,
    )
    .await;

    let diff = client.get_diff("graph.json", "r1", "r2").await.unwrap();

    assert!(!diff.has_changed);
    assert!(diff.changes.is_empty());
}

#[tokio::test]
async fn test_diff_of_modified_content() {
    let (client, _, _) = client_with(
        vec![envelope(&graph(1), "s1"), envelope(&graph(2), "s2")],
        None,
    )
    .await;

    let diff = client.get_diff("graph.json", "r1", "r2").await.unwrap();

    assert_eq!(diff.changes.len(), 1);
    assert_eq!(diff.changes[0].kind, ChangeKind::Modified);
    assert_eq!(diff.changes[0].before, Some(graph(1)));
    assert_eq!(diff.changes[0].after, Some(graph(2)));
}

#[tokio::test]
async fn test_diff_with_both_sides_missing_fails() {
    let (client, _, _) = client_with(vec![not_found(), not_found()], None).await;

    let err = client.get_diff("graph.json", "r1", "r2").await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[tokio::test]
async fn test_diff_failure_is_published_once() {
    let unauthorized = || Ok(StoreResponse::new(401, r#"{"message": "Bad credentials"}"#));
    let (client, _, sink) =
        client_with(vec![unauthorized(), unauthorized()], Some("ghp_revoked")).await;

    let err = client.get_diff("graph.json", "r1", "r2").await.unwrap_err();
    assert!(matches!(err, StoreError::AuthFailed { .. }));

    let failures: Vec<StoreEvent> = sink
        .events()
        .into_iter()
        .filter(|e| e.topic() == "operation.failed")
        .collect();
    assert_eq!(failures.len(), 1);
    assert!(matches!(
        &failures[0],
        StoreEvent::OperationFailed { operation, .. } if operation == "get_diff"
    ));
}

// =============================================================================
// State
// =============================================================================

#[tokio::test]
async fn test_quota_reflects_last_response() {
    let response = StoreResponse::new(404, "{}")
        .with_header("x-ratelimit-remaining", "4321")
        .with_header("x-ratelimit-limit", "5000");
    let (client, _, _) = client_with(vec![Ok(response)], None).await;

    client.fetch_file("graph.json", FetchOptions::default()).await.unwrap();

    let quota = client.quota().await;
    assert_eq!(quota.remaining, Some(4321));
    assert_eq!(quota.total, Some(5000));
    assert!(!quota.throttling);
    assert_eq!(client.pending_requests().await, 0);
}

#[tokio::test]
async fn test_clear_cache_forces_refetch() {
    let (client, transport, _) = client_with(
        vec![envelope(&graph(1), "s1"), envelope(&graph(1), "s1")],
        None,
    )
    .await;

    client.fetch_file("graph.json", FetchOptions::default()).await.unwrap();
    client.clear_cache().await;
    client.fetch_file("graph.json", FetchOptions::default()).await.unwrap();

    assert_eq!(transport.call_count(), 2);
}
