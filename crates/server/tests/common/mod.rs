//! Common test utilities for E2E testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with a mock fetcher injected, enabling E2E testing of the HTTP surface
//! without any network.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use multiplexer_core::{testing::MockFetcher, BatchDispatcher, Config, LimitsConfig};
use multiplexer_server::state::AppState;

/// Re-export fixtures for test convenience
pub use multiplexer_core::testing::fixtures;

/// Test fixture for E2E testing with a mock fetcher.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_batch() {
///     let fixture = TestFixture::new();
///     fixture.fetcher.set_response("A", json!({"x": 1})).await;
///
///     let response = fixture.post("/process", json!({"urls": ["A"]})).await;
///
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock fetcher - configure per-target responses, errors and delays
    pub fetcher: MockFetcher,
    /// Shared state, for inspecting gate and slot occupancy
    pub state: Arc<AppState>,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub text: String,
}

impl TestFixture {
    /// Create a new test fixture with small limits and short timeouts.
    pub fn new() -> Self {
        Self::with_limits(fixtures::limits(20, 4, 4))
    }

    /// Create a test fixture with custom limits.
    pub fn with_limits(limits: LimitsConfig) -> Self {
        let fetcher = MockFetcher::new();
        let config = Config {
            limits,
            ..Default::default()
        };

        let dispatcher = Arc::new(BatchDispatcher::from_limits(
            &config.limits,
            Arc::new(fetcher.clone()),
        ));
        let state = Arc::new(AppState::new(config, dispatcher));
        let router = multiplexer_server::api::create_router(Arc::clone(&state));

        Self {
            router,
            fetcher,
            state,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        self.send(
            Request::builder()
                .method("POST")
                .uri(path)
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let request_builder = Request::builder().method(method).uri(path);

        let request = match body {
            Some(json) => request_builder
                .header("Content-Type", "application/json")
                .body(Body::from(serde_json::to_string(&json).unwrap()))
                .unwrap(),
            None => request_builder.body(Body::empty()).unwrap(),
        };

        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let text = String::from_utf8_lossy(&body_bytes).to_string();
        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body, text }
    }
}
