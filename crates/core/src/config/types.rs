use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Concurrency and size limits applied to every batch.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LimitsConfig {
    /// Maximum number of targets accepted in one batch.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    /// Admission gate capacity: batches processed at the same time.
    #[serde(default = "default_max_concurrent_batches")]
    pub max_concurrent_batches: usize,
    /// Fetch slot pool size: fetches in flight at the same time.
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
    /// Whether the fetch slot pool is shared by all batches or created per batch.
    #[serde(default)]
    pub fetch_slot_scope: SlotScope,
    /// Timeout for a single fetch in milliseconds (default: 1000).
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
    /// Deadline for a whole batch in milliseconds (default: 10000).
    #[serde(default = "default_batch_timeout_ms")]
    pub batch_timeout_ms: u64,
}

impl LimitsConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn batch_timeout(&self) -> Duration {
        Duration::from_millis(self.batch_timeout_ms)
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
            max_concurrent_batches: default_max_concurrent_batches(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            fetch_slot_scope: SlotScope::default(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            batch_timeout_ms: default_batch_timeout_ms(),
        }
    }
}

fn default_max_batch_size() -> usize {
    20
}

fn default_max_concurrent_batches() -> usize {
    100
}

fn default_max_concurrent_fetches() -> usize {
    4
}

fn default_fetch_timeout_ms() -> u64 {
    1000
}

fn default_batch_timeout_ms() -> u64 {
    10_000
}

/// Where the outbound fetch limit applies.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SlotScope {
    /// Every batch gets its own pool of `max_concurrent_fetches` slots.
    #[default]
    PerBatch,
    /// One pool of `max_concurrent_fetches` slots shared by all batches.
    Global,
}

/// Outbound HTTP client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetcherConfig {
    /// User-Agent header sent with every fetch.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Responses larger than this are rejected (default: 10 MiB).
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            max_response_bytes: default_max_response_bytes(),
        }
    }
}

fn default_user_agent() -> String {
    format!("http-multiplexer/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_response_bytes() -> usize {
    10 * 1024 * 1024
}
