//! End-to-end tests with a mocked fetcher.
//!
//! These tests run the full router in-process with a `MockFetcher` standing
//! in for the outbound HTTP client.

mod common;

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use multiplexer_core::{FetchErrorKind, LimitsConfig, SlotScope};
use serde_json::json;
use tower::ServiceExt;

use common::{fixtures, TestFixture};

// =============================================================================
// Basic API Tests
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let fixture = TestFixture::new();
    let response = fixture.get("/health").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
}

#[tokio::test]
async fn test_config_endpoint() {
    let fixture = TestFixture::with_limits(fixtures::limits(7, 3, 2));
    let response = fixture.get("/config").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["limits"]["max_batch_size"], 7);
    assert_eq!(response.body["limits"]["max_concurrent_batches"], 3);
    assert_eq!(response.body["limits"]["max_concurrent_fetches"], 2);
    assert_eq!(response.body["limits"]["fetch_slot_scope"], "per_batch");
}

#[tokio::test]
async fn test_status_endpoint_idle() {
    let fixture = TestFixture::with_limits(fixtures::limits(20, 5, 4));
    let response = fixture.get("/status").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["admission"]["capacity"], 5);
    assert_eq!(response.body["admission"]["in_use"], 0);
    assert_eq!(response.body["admission"]["available"], 5);
    assert!(response.body["fetch_slots"].is_null());
    assert_eq!(response.body["max_batch_size"], 20);
}

#[tokio::test]
async fn test_status_endpoint_with_global_slots() {
    let fixture = TestFixture::with_limits(LimitsConfig {
        fetch_slot_scope: SlotScope::Global,
        ..fixtures::limits(20, 5, 3)
    });

    fixture
        .post("/process", json!({"urls": ["A", "B", "C", "D"]}))
        .await;
    let response = fixture.get("/status").await;

    assert_eq!(response.body["fetch_slots"]["max_concurrent"], 3);
    assert_eq!(response.body["fetch_slots"]["in_flight"], 0);
    assert_eq!(response.body["fetch_slots"]["total_acquired"], 4);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let fixture = TestFixture::new();
    fixture.post("/process", json!({"urls": ["A"]})).await;

    let response = fixture.get("/metrics").await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.text.contains("multiplexer_batches_total"));
    assert!(response.text.contains("multiplexer_http_requests_total"));
    assert!(response.text.contains("multiplexer_admission_available"));
}

// =============================================================================
// Batch Processing
// =============================================================================

#[tokio::test]
async fn test_process_single_target() {
    let fixture = TestFixture::new();
    fixture.fetcher.set_response("A", json!({"x": 1})).await;

    let response = fixture.post("/process", json!({"urls": ["A"]})).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, json!({"A": {"x": 1}}));
}

#[tokio::test]
async fn test_process_returns_every_target() {
    let fixture = TestFixture::new();
    fixture.fetcher.set_response("A", json!({"x": 1})).await;
    fixture.fetcher.set_response("B", json!([true, false])).await;
    fixture.fetcher.set_response("C", json!("text")).await;

    let response = fixture
        .post("/process", json!({"urls": ["A", "B", "C"]}))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.body,
        json!({"A": {"x": 1}, "B": [true, false], "C": "text"})
    );
}

#[tokio::test]
async fn test_duplicate_targets_collapse() {
    let fixture = TestFixture::new();

    let response = fixture
        .post("/process", json!({"urls": ["A", "A", "B"]}))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body.as_object().unwrap().len(), 2);
}

#[tokio::test]
async fn test_timeout_fails_whole_batch() {
    let fixture = TestFixture::new();
    fixture.fetcher.set_response("A", json!({"x": 1})).await;
    fixture
        .fetcher
        .set_delay("B", Duration::from_secs(2))
        .await;

    let response = fixture.post("/process", json!({"urls": ["A", "B"]})).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.body["error"],
        "Error retrieving data from B, error: timed out after 500 ms"
    );
    // No partial results
    assert!(response.body.get("A").is_none());
}

#[tokio::test]
async fn test_fetch_error_names_failing_target() {
    let fixture = TestFixture::new();
    fixture
        .fetcher
        .set_error("http://b.test", FetchErrorKind::Status { status: 404 })
        .await;

    let response = fixture
        .post("/process", json!({"urls": ["http://a.test", "http://b.test"]}))
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.body["error"],
        "Error retrieving data from http://b.test, error: unexpected HTTP status 404"
    );
}

#[tokio::test]
async fn test_batch_deadline_is_gateway_timeout() {
    let fixture = TestFixture::with_limits(LimitsConfig {
        fetch_timeout_ms: 500,
        batch_timeout_ms: 100,
        ..fixtures::limits(20, 4, 4)
    });
    fixture
        .fetcher
        .set_default_delay(Duration::from_millis(400))
        .await;

    let response = fixture.post("/process", json!({"urls": ["A", "B"]})).await;

    assert_eq!(response.status, StatusCode::GATEWAY_TIMEOUT);
    assert!(response.body["error"].as_str().unwrap().contains("100 ms"));
}

#[tokio::test]
async fn test_panicking_fetch_is_internal_error() {
    let fixture = TestFixture::new();
    fixture.fetcher.set_panic("A").await;

    let response = fixture.post("/process", json!({"urls": ["A"]})).await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body["error"], "Internal server error");
    assert_eq!(fixture.state.dispatcher().gate().in_use(), 0);
}

// =============================================================================
// Validation
// =============================================================================

#[tokio::test]
async fn test_empty_batch_rejected() {
    let fixture = TestFixture::new();

    let response = fixture.post("/process", json!({"urls": []})).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body["error"].is_string());
    assert_eq!(fixture.fetcher.call_count().await, 0);
}

#[tokio::test]
async fn test_oversized_batch_rejected() {
    let fixture = TestFixture::with_limits(fixtures::limits(3, 4, 4));
    let urls = fixtures::numbered_targets(4);

    let response = fixture.post("/process", json!({ "urls": urls })).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.body["error"],
        "Batch of 4 targets exceeds the maximum of 3"
    );
    assert_eq!(fixture.fetcher.call_count().await, 0);
}

#[tokio::test]
async fn test_batch_at_cap_accepted() {
    let fixture = TestFixture::with_limits(fixtures::limits(3, 4, 4));
    let urls = fixtures::numbered_targets(3);

    let response = fixture.post("/process", json!({ "urls": urls })).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body.as_object().unwrap().len(), 3);
}

#[tokio::test]
async fn test_malformed_json_rejected() {
    let fixture = TestFixture::new();

    let response = fixture.post_raw("/process", "{not json").await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body["error"].is_string());
}

#[tokio::test]
async fn test_missing_urls_field_rejected() {
    let fixture = TestFixture::new();

    let response = fixture.post("/process", json!({"targets": ["A"]})).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_wrong_method_not_allowed() {
    let fixture = TestFixture::new();

    let response = fixture.get("/process").await;

    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
}

// =============================================================================
// Admission
// =============================================================================

#[tokio::test]
async fn test_admission_rejection_is_429() {
    let fixture = TestFixture::with_limits(fixtures::limits(20, 1, 4));
    fixture.fetcher.hold();

    let request = Request::builder()
        .method("POST")
        .uri("/process")
        .header("Content-Type", "application/json")
        .body(Body::from(r#"{"urls": ["held"]}"#))
        .unwrap();
    let first = tokio::spawn(fixture.router.clone().oneshot(request));
    assert!(
        fixture
            .fetcher
            .wait_for_in_flight(1, Duration::from_secs(2))
            .await
    );

    let response = fixture.post("/process", json!({"urls": ["A"]})).await;

    assert_eq!(response.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        response.body["error"],
        "Max http requests on server reached, try again..."
    );

    fixture.fetcher.release();
    let first = first.await.unwrap().unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    // Capacity is back once the first batch finished
    let response = fixture.post("/process", json!({"urls": ["A"]})).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_dropped_request_releases_capacity() {
    let fixture = TestFixture::with_limits(fixtures::limits(20, 1, 4));
    fixture.fetcher.hold();

    let request = Request::builder()
        .method("POST")
        .uri("/process")
        .header("Content-Type", "application/json")
        .body(Body::from(r#"{"urls": ["A", "B"]}"#))
        .unwrap();
    let handle = tokio::spawn(fixture.router.clone().oneshot(request));
    assert!(
        fixture
            .fetcher
            .wait_for_in_flight(2, Duration::from_secs(2))
            .await
    );

    // Client goes away mid-batch
    handle.abort();
    let _ = handle.await;

    assert!(fixture.fetcher.wait_for_idle(Duration::from_secs(2)).await);
    assert_eq!(fixture.state.dispatcher().gate().in_use(), 0);
    assert_eq!(fixture.fetcher.completed(), 0);
}
