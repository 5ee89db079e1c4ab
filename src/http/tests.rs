//! HTTP layer tests

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Duration as ChronoDuration, Utc};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::auth::{AuthMethod, MemoryTokenCache, OAuth2Credentials, TokenRecord, TokenStore};
use crate::http::{HttpExecutor, HttpExecutorConfig, RateGovernor};
use crate::types::{BackoffType, StringMap};

fn fast_executor(auth: AuthMethod) -> HttpExecutor {
    let config = HttpExecutorConfig {
        max_retries: 3,
        backoff_base: Duration::from_millis(10),
        backoff_type: BackoffType::Constant,
        ..HttpExecutorConfig::default()
    };
    HttpExecutor::new(config, auth).unwrap()
}

fn no_params() -> StringMap {
    StringMap::new()
}

// ============================================================
// Rate governor
// ============================================================

#[test]
fn test_governor_unlimited_when_rate_unset() {
    assert!(!RateGovernor::per_minute(None).is_limited());
    assert!(!RateGovernor::per_minute(Some(0)).is_limited());
    assert!(!RateGovernor::unlimited().is_limited());
    assert!(RateGovernor::per_minute(Some(60)).is_limited());
}

#[test]
fn test_governor_period_from_rate() {
    assert_eq!(
        RateGovernor::per_minute(Some(60)).period(),
        Duration::from_secs(1)
    );
    assert_eq!(
        RateGovernor::per_minute(Some(120)).period(),
        Duration::from_millis(500)
    );
}

#[tokio::test]
async fn test_governor_unlimited_wait_is_instant() {
    let governor = RateGovernor::unlimited();
    let start = Instant::now();
    for _ in 0..100 {
        governor.wait().await;
    }
    assert!(start.elapsed() < Duration::from_millis(50));
}

#[tokio::test]
async fn test_governor_spaces_consecutive_permits() {
    // 1200 rpm -> 50ms between permits
    let governor = RateGovernor::per_minute(Some(1200));

    let start = Instant::now();
    for _ in 0..3 {
        governor.wait().await;
    }
    // first permit is immediate, the next two are spaced one period each
    assert!(
        start.elapsed() >= Duration::from_millis(95),
        "elapsed {:?}",
        start.elapsed()
    );
}

#[tokio::test]
async fn test_governor_clones_share_state() {
    let governor = RateGovernor::per_minute(Some(1200));
    let clone = governor.clone();

    let start = Instant::now();
    governor.wait().await;
    clone.wait().await;
    assert!(
        start.elapsed() >= Duration::from_millis(45),
        "elapsed {:?}",
        start.elapsed()
    );
}

#[tokio::test]
async fn test_governor_concurrent_callers_cannot_burst() {
    let governor = RateGovernor::per_minute(Some(1200));

    let start = Instant::now();
    let mut handles = Vec::new();
    for _ in 0..4 {
        let governor = governor.clone();
        handles.push(tokio::spawn(async move { governor.wait().await }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    // 4 permits need at least 3 periods between them
    assert!(
        start.elapsed() >= Duration::from_millis(140),
        "elapsed {:?}",
        start.elapsed()
    );
}

// ============================================================
// Executor retry behavior
// ============================================================

#[tokio::test]
async fn test_get_decodes_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [1, 2, 3]})))
        .expect(1)
        .mount(&server)
        .await;

    let executor = fast_executor(AuthMethod::None);
    let body = executor
        .get(
            &format!("{}/items", server.uri()),
            &no_params(),
            &RateGovernor::unlimited(),
        )
        .await
        .unwrap();

    assert_eq!(body["data"], json!([1, 2, 3]));
}

#[tokio::test]
async fn test_query_params_are_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .and(query_param("page", "2"))
        .and(query_param("limit", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let mut params = StringMap::new();
    params.insert("page".to_string(), "2".to_string());
    params.insert("limit".to_string(), "50".to_string());

    let executor = fast_executor(AuthMethod::None);
    executor
        .get(
            &format!("{}/items", server.uri()),
            &params,
            &RateGovernor::unlimited(),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_retries_on_server_error_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let executor = fast_executor(AuthMethod::None);
    let body = executor
        .get(
            &format!("{}/items", server.uri()),
            &no_params(),
            &RateGovernor::unlimited(),
        )
        .await
        .unwrap();

    assert_eq!(body["ok"], json!(true));
}

#[tokio::test]
async fn test_no_retry_on_client_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .expect(1)
        .mount(&server)
        .await;

    let executor = fast_executor(AuthMethod::None);
    let err = executor
        .get(
            &format!("{}/missing", server.uri()),
            &no_params(),
            &RateGovernor::unlimited(),
        )
        .await
        .unwrap_err();

    match err {
        crate::Error::HttpStatus { status, .. } => assert_eq!(status, 404),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_rate_limited_honors_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(
            ResponseTemplate::new(429).insert_header("retry-after", "0"),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let executor = fast_executor(AuthMethod::None);
    executor
        .get(
            &format!("{}/items", server.uri()),
            &no_params(),
            &RateGovernor::unlimited(),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_retry_budget_exhausted_carries_last_failure() {
    let server = MockServer::start().await;
    // initial attempt + 3 retries
    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(ResponseTemplate::new(503))
        .expect(4)
        .mount(&server)
        .await;

    let executor = fast_executor(AuthMethod::None);
    let err = executor
        .get(
            &format!("{}/items", server.uri()),
            &no_params(),
            &RateGovernor::unlimited(),
        )
        .await
        .unwrap_err();

    match err {
        crate::Error::Extraction { message, source } => {
            assert!(message.contains("max retries"), "message: {message}");
            assert!(source.is_some());
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

// ============================================================
// Auth integration
// ============================================================

#[tokio::test]
async fn test_bearer_token_attached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .and(header("authorization", "Bearer secret-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let executor = fast_executor(AuthMethod::Bearer {
        token: "secret-token".to_string(),
    });
    executor
        .get(
            &format!("{}/items", server.uri()),
            &no_params(),
            &RateGovernor::unlimited(),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_replay_transport_failure_goes_back_into_retry_loop() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-token",
            "expires_in": 3600,
        })))
        .expect(1)
        .mount(&server)
        .await;

    // stale token draws a 401, forcing the refresh
    Mock::given(method("GET"))
        .and(path("/items"))
        .and(header("authorization", "Bearer stale-token"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    // the replay times out; the next attempt with the same token succeeds
    Mock::given(method("GET"))
        .and(path("/items"))
        .and(header("authorization", "Bearer fresh-token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(2))
                .set_body_json(json!({"ok": true})),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .and(header("authorization", "Bearer fresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let credentials = OAuth2Credentials {
        token_url: format!("{}/oauth/token", server.uri()),
        client_id: "cid".to_string(),
        client_secret: "cs".to_string(),
        redirect_uri: "http://localhost/callback".to_string(),
        scope: None,
    };
    let record = TokenRecord {
        access_token: "stale-token".to_string(),
        refresh_token: Some("rt-1".to_string()),
        expires_at: Utc::now() + ChronoDuration::hours(1),
        token_type: Some("Bearer".to_string()),
        scope: None,
    };
    let store = TokenStore::open(credentials, Box::new(MemoryTokenCache::with_record(record)))
        .await
        .unwrap();

    let config = HttpExecutorConfig {
        timeout: Duration::from_millis(300),
        max_retries: 3,
        backoff_base: Duration::from_millis(10),
        backoff_type: BackoffType::Constant,
        ..HttpExecutorConfig::default()
    };
    let executor = HttpExecutor::new(config, AuthMethod::oauth2(Arc::new(store))).unwrap();

    let body = executor
        .get(
            &format!("{}/items", server.uri()),
            &no_params(),
            &RateGovernor::unlimited(),
        )
        .await
        .unwrap();

    assert_eq!(body["ok"], json!(true));
}

#[tokio::test]
async fn test_unauthorized_refreshes_token_once_and_replays() {
    let server = MockServer::start().await;

    // Token endpoint must be hit exactly once for the forced refresh
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-token",
            "refresh_token": "rt-2",
            "expires_in": 3600,
            "token_type": "Bearer",
        })))
        .expect(1)
        .mount(&server)
        .await;

    // First API call sees the stale token and rejects it
    Mock::given(method("GET"))
        .and(path("/items"))
        .and(header("authorization", "Bearer stale-token"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .and(header("authorization", "Bearer fresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let credentials = OAuth2Credentials {
        token_url: format!("{}/oauth/token", server.uri()),
        client_id: "cid".to_string(),
        client_secret: "cs".to_string(),
        redirect_uri: "http://localhost/callback".to_string(),
        scope: None,
    };
    // Token is not locally expired, so only the server-side 401 triggers refresh
    let record = TokenRecord {
        access_token: "stale-token".to_string(),
        refresh_token: Some("rt-1".to_string()),
        expires_at: Utc::now() + ChronoDuration::hours(1),
        token_type: Some("Bearer".to_string()),
        scope: None,
    };
    let store = TokenStore::open(credentials, Box::new(MemoryTokenCache::with_record(record)))
        .await
        .unwrap();

    let executor = fast_executor(AuthMethod::oauth2(Arc::new(store)));
    let body = executor
        .get(
            &format!("{}/items", server.uri()),
            &no_params(),
            &RateGovernor::unlimited(),
        )
        .await
        .unwrap();

    assert_eq!(body["ok"], json!(true));
}
