//! reqwest-backed fetcher.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::FetcherConfig;

use super::{FetchError, FetchErrorKind, Fetcher};

/// Fetches JSON documents over HTTP(S).
pub struct HttpFetcher {
    client: Client,
    config: FetcherConfig,
}

impl HttpFetcher {
    /// Create a new HttpFetcher with the given configuration.
    pub fn new(config: FetcherConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { client, config })
    }

    async fn get_json(&self, target: &str, url: Url) -> Result<Value, FetchError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::new(target, FetchErrorKind::Transport(e.to_string())))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                target,
                FetchErrorKind::Status {
                    status: status.as_u16(),
                },
            ));
        }

        let limit = self.config.max_response_bytes;
        if response
            .content_length()
            .is_some_and(|len| len > limit as u64)
        {
            return Err(FetchError::new(
                target,
                FetchErrorKind::BodyTooLarge { limit },
            ));
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| FetchError::new(target, FetchErrorKind::Transport(e.to_string())))?
        {
            if body.len() + chunk.len() > limit {
                return Err(FetchError::new(
                    target,
                    FetchErrorKind::BodyTooLarge { limit },
                ));
            }
            body.extend_from_slice(&chunk);
        }

        debug!(url = target, bytes = body.len(), "Fetched payload");

        serde_json::from_slice(&body)
            .map_err(|e| FetchError::new(target, FetchErrorKind::Decode(e.to_string())))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(
        &self,
        target: &str,
        scope: &CancellationToken,
        timeout: Duration,
    ) -> Result<Value, FetchError> {
        let url = Url::parse(target)
            .map_err(|e| FetchError::new(target, FetchErrorKind::InvalidTarget(e.to_string())))?;

        if scope.is_cancelled() {
            return Err(FetchError::cancelled(target));
        }

        // Dropping the request future aborts the connection.
        tokio::select! {
            biased;
            _ = scope.cancelled() => Err(FetchError::cancelled(target)),
            result = tokio::time::timeout(timeout, self.get_json(target, url)) => {
                result.unwrap_or_else(|_| Err(FetchError::timeout(target, timeout)))
            }
        }
    }
}
