//! Testing utilities and mock implementations.
//!
//! This module provides a mock implementation of the `Fetcher` trait so the
//! multiplexer, the dispatcher and the HTTP layer can be exercised without
//! any network.
//!
//! # Example
//!
//! ```rust,ignore
//! use multiplexer_core::testing::MockFetcher;
//!
//! let fetcher = MockFetcher::new();
//! fetcher.set_response("A", json!({"x": 1})).await;
//! fetcher.set_error("B", FetchErrorKind::Timeout { timeout_ms: 1000 }).await;
//!
//! // Use in BatchMultiplexer / AppState...
//! ```

mod mock_fetcher;

pub use mock_fetcher::MockFetcher;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::config::LimitsConfig;

    /// Build owned targets from string slices.
    pub fn targets(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    /// `n` distinct targets named `t0..t{n-1}`.
    pub fn numbered_targets(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("t{}", i)).collect()
    }

    /// Small limits with short timeouts for fast tests.
    pub fn limits(
        max_batch_size: usize,
        max_concurrent_batches: usize,
        max_concurrent_fetches: usize,
    ) -> LimitsConfig {
        LimitsConfig {
            max_batch_size,
            max_concurrent_batches,
            max_concurrent_fetches,
            fetch_timeout_ms: 500,
            batch_timeout_ms: 5000,
            ..Default::default()
        }
    }
}
