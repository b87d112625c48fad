//! CfClient against a fake Cloud Foundry API.
//!
//! An axum server stands in for both the v2 API and UAA, checking the
//! credentials and bearer token on every request.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::extract::{Form, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use cfsd_core::{RuntimeInstance, WorkloadState};
use cfsd_platform::{CfClient, CfClientConfig, PlatformApi, PlatformError};

/// base64("cfsd:secret")
const EXPECTED_BASIC: &str = "Basic Y2ZzZDpzZWNyZXQ=";
const TOKEN: &str = "test-token";

#[derive(Clone)]
struct FakeCf {
    base: String,
    token_requests: Arc<AtomicUsize>,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {TOKEN}"))
}

async fn info(State(fake): State<FakeCf>) -> impl IntoResponse {
    Json(json!({
        "api_version": "2.150.0",
        "authorization_endpoint": fake.base,
        "token_endpoint": fake.base,
    }))
}

async fn token(
    State(fake): State<FakeCf>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> impl IntoResponse {
    fake.token_requests.fetch_add(1, Ordering::SeqCst);

    let basic_ok = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == EXPECTED_BASIC);
    let grant_ok = form.get("grant_type").map(String::as_str) == Some("client_credentials");

    if !basic_ok || !grant_ok {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthorized"}))).into_response();
    }

    Json(json!({
        "access_token": TOKEN,
        "token_type": "bearer",
        "expires_in": 3600,
    }))
    .into_response()
}

async fn apps(headers: HeaderMap, Query(query): Query<HashMap<String, String>>) -> impl IntoResponse {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let page = query.get("page").map(String::as_str).unwrap_or("1");
    let body = if page == "1" {
        json!({
            "total_results": 3,
            "next_url": "/v2/apps?page=2&results-per-page=100",
            "resources": [
                {"metadata": {"guid": "app-1"}, "entity": {"name": "api", "state": "STARTED", "space_guid": "space-1"}},
                {"metadata": {"guid": "app-2"}, "entity": {"name": "worker", "state": "STARTED", "space_guid": "space-2"}}
            ]
        })
    } else {
        json!({
            "total_results": 3,
            "next_url": null,
            "resources": [
                {"metadata": {"guid": "app-3"}, "entity": {"name": "batch", "state": "STOPPED", "space_guid": "space-1"}}
            ]
        })
    };
    Json(body).into_response()
}

async fn organizations(headers: HeaderMap) -> impl IntoResponse {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({
        "next_url": null,
        "resources": [
            {"metadata": {"guid": "org-1"}, "entity": {"name": "acme"}}
        ]
    }))
    .into_response()
}

async fn spaces(headers: HeaderMap) -> impl IntoResponse {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({
        "next_url": null,
        "resources": [
            {"metadata": {"guid": "space-1"}, "entity": {"name": "dev", "organization_guid": "org-1"}},
            {"metadata": {"guid": "space-2"}, "entity": {"name": "prod", "organization_guid": "org-1"}}
        ]
    }))
    .into_response()
}

async fn stats(headers: HeaderMap, Path(guid): Path<String>) -> impl IntoResponse {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match guid.as_str() {
        "app-1" => Json(json!({
            "1": {"state": "RUNNING", "stats": {"host": "10.0.0.2", "port": 61002}},
            "0": {"state": "RUNNING", "stats": {"host": "10.0.0.1", "port": 61001}}
        }))
        .into_response(),
        "broken" => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        _ => Json(json!({})).into_response(),
    }
}

async fn spawn_fake_cf() -> (String, Arc<AtomicUsize>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let token_requests = Arc::new(AtomicUsize::new(0));

    let fake = FakeCf {
        base: base.clone(),
        token_requests: token_requests.clone(),
    };

    let router = Router::new()
        .route("/v2/info", get(info))
        .route("/oauth/token", post(token))
        .route("/v2/apps", get(apps))
        .route("/v2/apps/{guid}/stats", get(stats))
        .route("/v2/organizations", get(organizations))
        .route("/v2/spaces", get(spaces))
        .with_state(fake);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (base, token_requests)
}

fn config(base: &str, secret: &str) -> CfClientConfig {
    CfClientConfig {
        api_address: base.to_string(),
        client_id: "cfsd".to_string(),
        client_secret: secret.to_string(),
        skip_ssl: false,
        request_timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn lists_workloads_across_pages() {
    let (base, _) = spawn_fake_cf().await;
    let client = CfClient::connect(config(&base, "secret")).await.unwrap();

    let workloads = client.list_workloads().await.unwrap();
    let ids: Vec<&str> = workloads.iter().map(|w| w.id.as_str()).collect();
    assert_eq!(ids, vec!["app-1", "app-2", "app-3"]);
    assert_eq!(workloads[0].name, "api");
    assert_eq!(workloads[0].sub_unit_id, "space-1");
    assert_eq!(workloads[2].state, WorkloadState::Stopped);
}

#[tokio::test]
async fn lists_orgs_and_spaces() {
    let (base, _) = spawn_fake_cf().await;
    let client = CfClient::connect(config(&base, "secret")).await.unwrap();

    let orgs = client.list_org_units().await.unwrap();
    assert_eq!(orgs.len(), 1);
    assert_eq!(orgs[0].id, "org-1");
    assert_eq!(orgs[0].name, "acme");

    let spaces = client.list_sub_units().await.unwrap();
    assert_eq!(spaces.len(), 2);
    assert_eq!(spaces[1].name, "prod");
    assert_eq!(spaces[1].org_unit_id, "org-1");
}

#[tokio::test]
async fn fetches_instances_in_index_order() {
    let (base, _) = spawn_fake_cf().await;
    let client = CfClient::connect(config(&base, "secret")).await.unwrap();

    let instances = client.fetch_runtime_instances("app-1").await.unwrap();
    assert_eq!(
        instances,
        vec![
            RuntimeInstance::new("10.0.0.1", 61001),
            RuntimeInstance::new("10.0.0.2", 61002),
        ]
    );

    assert!(client.fetch_runtime_instances("app-2").await.unwrap().is_empty());
}

#[tokio::test]
async fn token_is_cached_between_calls() {
    let (base, token_requests) = spawn_fake_cf().await;
    let client = CfClient::connect(config(&base, "secret")).await.unwrap();

    client.list_workloads().await.unwrap();
    client.list_org_units().await.unwrap();
    client.fetch_runtime_instances("app-1").await.unwrap();

    assert_eq!(token_requests.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn rejected_credentials_fail_connect() {
    let (base, _) = spawn_fake_cf().await;
    let err = CfClient::connect(config(&base, "wrong")).await.err().unwrap();
    assert!(matches!(err, PlatformError::Auth(_)), "got {err}");
}

#[tokio::test]
async fn error_status_is_reported() {
    let (base, _) = spawn_fake_cf().await;
    let client = CfClient::connect(config(&base, "secret")).await.unwrap();

    let err = client.fetch_runtime_instances("broken").await.unwrap_err();
    match err {
        PlatformError::Status { status, url } => {
            assert_eq!(status, 500);
            assert!(url.ends_with("/v2/apps/broken/stats"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn unreachable_api_fails_connect() {
    let err = CfClient::connect(config("http://127.0.0.1:1", "secret"))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, PlatformError::Http { .. }), "got {err}");
}
