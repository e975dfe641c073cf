//! Batch processing API handler.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use multiplexer_core::{BatchError, BatchRequest, BatchResult};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::state::AppState;

/// Error body returned for every failed batch
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// Map a batch failure to the status code and message the client sees.
pub fn error_response(err: &BatchError) -> ApiError {
    match err {
        BatchError::Validation(e) => api_error(StatusCode::BAD_REQUEST, e.to_string()),
        BatchError::AdmissionRejected { .. } => api_error(
            StatusCode::TOO_MANY_REQUESTS,
            "Max http requests on server reached, try again...",
        ),
        BatchError::Fetch(e) => api_error(
            StatusCode::BAD_REQUEST,
            format!("Error retrieving data from {}, error: {}", e.target, e.kind),
        ),
        BatchError::DeadlineExceeded { .. } => {
            api_error(StatusCode::GATEWAY_TIMEOUT, err.to_string())
        }
        BatchError::Cancelled => api_error(StatusCode::SERVICE_UNAVAILABLE, err.to_string()),
        BatchError::Internal(_) => {
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

/// POST /process - fetch every URL of the batch and return them keyed by URL
pub async fn process_batch(
    State(state): State<Arc<AppState>>,
    body: Result<Json<BatchRequest>, JsonRejection>,
) -> Result<Json<BatchResult>, ApiError> {
    let Json(request) = body.map_err(|rejection| {
        debug!("Rejecting malformed batch body: {}", rejection.body_text());
        api_error(StatusCode::BAD_REQUEST, rejection.body_text())
    })?;

    // Cancelled when the client goes away and axum drops this future
    let scope = CancellationToken::new();
    let _cancel_on_disconnect = scope.clone().drop_guard();

    match state.dispatcher().dispatch(request.urls, &scope).await {
        Ok(results) => Ok(Json(results)),
        Err(e) => {
            match &e {
                BatchError::Internal(msg) => error!("Batch failed internally: {}", msg),
                BatchError::Cancelled => warn!("Batch cancelled before completion"),
                _ => debug!("Batch failed: {}", e),
            }
            Err(error_response(&e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use multiplexer_core::{FetchError, FetchErrorKind, ValidationError};

    #[test]
    fn test_fetch_error_names_target() {
        let err = BatchError::Fetch(FetchError::new(
            "http://b.test",
            FetchErrorKind::Status { status: 404 },
        ));
        let (status, Json(body)) = error_response(&err);

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body.error,
            "Error retrieving data from http://b.test, error: unexpected HTTP status 404"
        );
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                BatchError::Validation(ValidationError::Empty),
                StatusCode::BAD_REQUEST,
            ),
            (
                BatchError::AdmissionRejected { capacity: 100 },
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                BatchError::DeadlineExceeded { timeout_ms: 10_000 },
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (BatchError::Cancelled, StatusCode::SERVICE_UNAVAILABLE),
            (
                BatchError::Internal("boom".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(error_response(&err).0, expected, "for {:?}", err);
        }
    }

    #[test]
    fn test_internal_details_not_leaked() {
        let (_, Json(body)) = error_response(&BatchError::Internal("task panicked".to_string()));
        assert_eq!(body.error, "Internal server error");
    }
}
