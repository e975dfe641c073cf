//! Per-target fetch adapter.
//!
//! This module provides a `Fetcher` trait for retrieving one target under a
//! timeout and a cancellation scope, and an HTTP implementation that decodes
//! the payload as JSON.

mod http;
mod types;

pub use http::HttpFetcher;
pub use types::*;
