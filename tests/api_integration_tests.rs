//! Integration Tests for API Endpoints
//!
//! Tests the full request/response cycle for each endpoint.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use pincache::{
    api::create_router, AppState, CacheConfig, Config, ManualScheduler, ObjectCache,
    SweepSchedulers,
};
use serde_json::Value;
use tower::ServiceExt;

// == Helper Functions ==

fn create_test_app() -> Router {
    let cache = ObjectCache::new(CacheConfig::new("integration", 31).with_unique_keys(true));
    create_router(AppState::new(cache))
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    (status, body_to_json(response.into_body()).await)
}

// == PUT Endpoint Tests ==

#[tokio::test]
async fn test_put_endpoint_success() {
    let app = create_test_app();

    let (status, json) = send(
        &app,
        "PUT",
        "/objects",
        Some(r#"{"key":"test_key","value":"test_value"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["message"].as_str().unwrap().contains("test_key"));
    assert_eq!(json["pin_count"], 0);
}

#[tokio::test]
async fn test_put_pinned() {
    let app = create_test_app();

    let (status, json) = send(
        &app,
        "PUT",
        "/objects",
        Some(r#"{"key":"pinned","value":"v","pinned":true}"#),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["pin_count"], 1);
}

#[tokio::test]
async fn test_put_empty_key_rejected() {
    let app = create_test_app();

    let (status, json) = send(&app, "PUT", "/objects", Some(r#"{"key":"","value":"v"}"#)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("empty"));
}

#[tokio::test]
async fn test_put_duplicate_key_conflicts() {
    let app = create_test_app();
    let body = r#"{"key":"dup","value":"v"}"#;

    let (first, _) = send(&app, "PUT", "/objects", Some(body)).await;
    let (second, json) = send(&app, "PUT", "/objects", Some(body)).await;

    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::CONFLICT);
    assert!(json["error"].as_str().unwrap().contains("Duplicate"));
}

// == GET Endpoint Tests ==

#[tokio::test]
async fn test_get_endpoint_success() {
    let app = create_test_app();
    send(
        &app,
        "PUT",
        "/objects",
        Some(r#"{"key":"get_key","value":"get_value"}"#),
    )
    .await;

    let (status, json) = send(&app, "GET", "/objects/get_key", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["key"], "get_key");
    assert_eq!(json["value"], "get_value");
}

#[tokio::test]
async fn test_get_endpoint_not_found() {
    let app = create_test_app();

    let (status, json) = send(&app, "GET", "/objects/nonexistent_key", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json.get("error").is_some());
}

#[tokio::test]
async fn test_get_faults_value_in() {
    let cache = ObjectCache::new(CacheConfig::new("faulting", 31));
    cache.set_fault_strategy(Arc::new(
        |key: &String| -> anyhow::Result<Option<String>> {
            if key.starts_with("db-") {
                Ok(Some(format!("loaded {key}")))
            } else if key == "broken" {
                Err(anyhow::anyhow!("backend unavailable"))
            } else {
                Ok(None)
            }
        },
    ));
    let app = create_router(AppState::new(cache));

    let (status, json) = send(&app, "GET", "/objects/db-7", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["value"], "loaded db-7");

    let (status, _) = send(&app, "GET", "/objects/other", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = send(&app, "GET", "/objects/broken", None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(json["error"].as_str().unwrap().contains("backend unavailable"));

    let (_, stats) = send(&app, "GET", "/stats", None).await;
    assert_eq!(stats["faults"], 1);
    assert_eq!(stats["total_objects"], 1);
}

// == Pin Endpoint Tests ==

#[tokio::test]
async fn test_pin_unpin_cycle() {
    let app = create_test_app();
    send(&app, "PUT", "/objects", Some(r#"{"key":"p","value":"v"}"#)).await;

    let (status, json) = send(&app, "POST", "/objects/p/pin", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["pin_count"], 1);

    let (status, json) = send(&app, "POST", "/objects/p/unpin", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["pin_count"], 0);

    let (status, _) = send(&app, "POST", "/objects/p/unpin", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_pin_missing_key() {
    let app = create_test_app();

    let (status, _) = send(&app, "POST", "/objects/ghost/pin", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

// == DELETE Endpoint Tests ==

#[tokio::test]
async fn test_delete_endpoint_success() {
    let app = create_test_app();
    send(&app, "PUT", "/objects", Some(r#"{"key":"del","value":"v"}"#)).await;

    let (status, json) = send(&app, "DELETE", "/objects/del", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["message"].as_str().unwrap().contains("del"));

    let (status, _) = send(&app, "GET", "/objects/del", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_pinned_requires_drop_ref() {
    let app = create_test_app();
    send(
        &app,
        "PUT",
        "/objects",
        Some(r#"{"key":"held","value":"v","pinned":true}"#),
    )
    .await;

    let (status, json) = send(&app, "DELETE", "/objects/held", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].as_str().unwrap().contains("pin count 1"));

    let (status, _) = send(&app, "DELETE", "/objects/held?drop_ref=true", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_delete_endpoint_not_found() {
    let app = create_test_app();

    let (status, _) = send(&app, "DELETE", "/objects/nonexistent", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

// == STATS Endpoint Tests ==

#[tokio::test]
async fn test_stats_track_hits_and_misses() {
    let app = create_test_app();
    send(&app, "PUT", "/objects", Some(r#"{"key":"s","value":"v"}"#)).await;
    send(&app, "GET", "/objects/s", None).await;
    send(&app, "GET", "/objects/s", None).await;
    send(&app, "GET", "/objects/missing", None).await;

    let (status, json) = send(&app, "GET", "/stats", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["name"], "integration");
    assert_eq!(json["hits"], 2);
    assert_eq!(json["misses"], 1);
    assert_eq!(json["total_objects"], 1);
    assert!(json["sweep"].is_null());
}

#[tokio::test]
async fn test_stats_report_sweep() {
    let scheduler = Arc::new(ManualScheduler::new());
    let config = Config {
        preferred_max_size: 2,
        sweep_interval_ms: 60_000,
        ..Config::default()
    };
    let state = AppState::from_config(&config, SweepSchedulers::shared(scheduler.clone()));
    let app = create_router(state);

    for key in ["a", "b", "c"] {
        let body = format!(r#"{{"key":"{key}","value":"v"}}"#);
        send(&app, "PUT", "/objects", Some(&body)).await;
    }
    scheduler.run_pending();
    scheduler.run_pending();

    let (status, json) = send(&app, "GET", "/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["sweep"]["firings"], 2);
    assert_eq!(json["sweep"]["evicted"], 3);
    assert_eq!(json["evictions"], 3);
    assert_eq!(json["total_objects"], 0);
}

// == HEALTH Endpoint Tests ==

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app();

    let (status, json) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert!(json.get("timestamp").is_some());
}
