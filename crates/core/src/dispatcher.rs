//! Admission-controlled entry point for batches.
//!
//! Validates the batch, takes an admission ticket without waiting, and runs
//! the multiplexer while holding the ticket. The ticket is released when the
//! dispatch future completes or is dropped.

use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::admission::AdmissionGate;
use crate::config::LimitsConfig;
use crate::fetcher::Fetcher;
use crate::multiplexer::{record_batch, BatchError, BatchMultiplexer, BatchResult};

pub struct BatchDispatcher {
    gate: Arc<AdmissionGate>,
    multiplexer: Arc<BatchMultiplexer>,
}

impl BatchDispatcher {
    pub fn new(gate: Arc<AdmissionGate>, multiplexer: Arc<BatchMultiplexer>) -> Self {
        Self { gate, multiplexer }
    }

    /// Build a gate and multiplexer from the configured limits.
    pub fn from_limits(limits: &LimitsConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        Self::new(
            Arc::new(AdmissionGate::new(limits.max_concurrent_batches)),
            Arc::new(BatchMultiplexer::new(limits, fetcher)),
        )
    }

    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    pub fn multiplexer(&self) -> &BatchMultiplexer {
        &self.multiplexer
    }

    /// Run one batch end to end.
    ///
    /// Validation happens before admission, so a malformed batch never takes
    /// capacity. An exhausted gate yields `AdmissionRejected` immediately.
    pub async fn dispatch(
        &self,
        targets: Vec<String>,
        scope: &CancellationToken,
    ) -> Result<BatchResult, BatchError> {
        let start = Instant::now();

        if let Err(e) = self.multiplexer.validate(&targets) {
            debug!(error = %e, "Rejecting invalid batch");
            record_batch("validation", start.elapsed());
            return Err(e.into());
        }

        let Some(_ticket) = self.gate.try_acquire() else {
            warn!(
                capacity = self.gate.capacity(),
                "Too many concurrent batches, rejecting"
            );
            record_batch("rejected", start.elapsed());
            return Err(BatchError::AdmissionRejected {
                capacity: self.gate.capacity(),
            });
        };

        self.multiplexer.process(targets, scope).await
    }
}
