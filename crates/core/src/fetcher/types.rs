//! Types for the fetch adapter.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Retrieves one target and decodes it into a structured value.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetcher name, for logs.
    fn name(&self) -> &str;

    /// Fetch a single target.
    ///
    /// Must return promptly once `scope` is cancelled, and must not take
    /// longer than `timeout`.
    async fn fetch(
        &self,
        target: &str,
        scope: &CancellationToken,
        timeout: Duration,
    ) -> Result<Value, FetchError>;
}

/// Failure to retrieve or decode one target.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Fetching {target} failed: {kind}")]
pub struct FetchError {
    /// The target that failed.
    pub target: String,
    /// What went wrong.
    pub kind: FetchErrorKind,
}

impl FetchError {
    pub fn new(target: impl Into<String>, kind: FetchErrorKind) -> Self {
        Self {
            target: target.into(),
            kind,
        }
    }

    pub fn timeout(target: impl Into<String>, timeout: Duration) -> Self {
        Self::new(
            target,
            FetchErrorKind::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            },
        )
    }

    pub fn cancelled(target: impl Into<String>) -> Self {
        Self::new(target, FetchErrorKind::Cancelled)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind, FetchErrorKind::Cancelled)
    }
}

/// Failure causes, kept apart for reporting only.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchErrorKind {
    #[error("invalid target URL: {0}")]
    InvalidTarget(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("unexpected HTTP status {status}")]
    Status { status: u16 },

    #[error("response body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("payload is not valid JSON: {0}")]
    Decode(String),

    #[error("cancelled")]
    Cancelled,
}
