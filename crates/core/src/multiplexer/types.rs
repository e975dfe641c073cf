//! Types for the batch multiplexer.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

use crate::fetcher::FetchError;

/// Fetched values keyed by target.
pub type BatchResult = HashMap<String, Value>;

/// Inbound batch envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchRequest {
    pub urls: Vec<String>,
}

/// A batch rejected before any work started.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Batch contains no targets")]
    Empty,

    #[error("Batch of {size} targets exceeds the maximum of {max}")]
    TooLarge { size: usize, max: usize },
}

/// Terminal outcome of a batch that did not succeed.
#[derive(Debug, Clone, Error)]
pub enum BatchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Admission gate at capacity ({capacity} concurrent batches)")]
    AdmissionRejected { capacity: usize },

    /// First fetch to fail; siblings were cancelled.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The caller's scope ended before the batch finished.
    #[error("Batch cancelled by caller")]
    Cancelled,

    #[error("Batch deadline of {timeout_ms} ms exceeded")]
    DeadlineExceeded { timeout_ms: u64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BatchError {
    /// Metric label for this outcome.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::AdmissionRejected { .. } => "rejected",
            Self::Fetch(_) => "fetch_error",
            Self::Cancelled => "cancelled",
            Self::DeadlineExceeded { .. } => "deadline",
            Self::Internal(_) => "internal",
        }
    }
}
