//! Batch multiplexer implementation.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::{LimitsConfig, SlotScope};
use crate::fetcher::Fetcher;
use crate::metrics::{BATCHES_TOTAL, BATCH_DURATION, BATCH_SIZE, FETCHES_TOTAL, FETCH_DURATION};

use super::slots::{FetchSlot, FetchSlotPool};
use super::types::{BatchError, BatchResult, ValidationError};

/// Set-once cell holding the batch's terminal error. The first writer wins.
#[derive(Debug, Default)]
struct FirstError(OnceLock<BatchError>);

impl FirstError {
    fn record(&self, error: BatchError) -> bool {
        self.0.set(error).is_ok()
    }

    fn get(&self) -> Option<BatchError> {
        self.0.get().cloned()
    }
}

/// Everything one spawned fetch needs.
struct FetchTask {
    fetcher: Arc<dyn Fetcher>,
    target: String,
    scope: CancellationToken,
    timeout: Duration,
    outcome: Arc<FirstError>,
    results: mpsc::Sender<(String, Value)>,
    slot: FetchSlot,
}

/// Fans a batch of targets out to the fetcher and fans the results back in.
///
/// A batch either yields a value for every target or fails as a whole; the
/// first failing fetch cancels its siblings and becomes the batch's outcome.
pub struct BatchMultiplexer {
    fetcher: Arc<dyn Fetcher>,
    max_batch_size: usize,
    max_concurrent_fetches: usize,
    fetch_timeout: Duration,
    batch_timeout: Duration,
    /// Present when every batch draws from one shared pool.
    shared_slots: Option<Arc<FetchSlotPool>>,
}

impl BatchMultiplexer {
    /// # Panics
    ///
    /// Panics if `max_batch_size` or `max_concurrent_fetches` is 0.
    pub fn new(limits: &LimitsConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        assert!(limits.max_batch_size > 0, "max_batch_size must be > 0");
        assert!(
            limits.max_concurrent_fetches > 0,
            "max_concurrent_fetches must be > 0"
        );

        let shared_slots = match limits.fetch_slot_scope {
            SlotScope::Global => Some(Arc::new(FetchSlotPool::new(
                limits.max_concurrent_fetches,
            ))),
            SlotScope::PerBatch => None,
        };

        Self {
            fetcher,
            max_batch_size: limits.max_batch_size,
            max_concurrent_fetches: limits.max_concurrent_fetches,
            fetch_timeout: limits.fetch_timeout(),
            batch_timeout: limits.batch_timeout(),
            shared_slots,
        }
    }

    /// Use `pool` for every batch instead of the configured slot scope.
    pub fn with_slot_pool(mut self, pool: Arc<FetchSlotPool>) -> Self {
        self.max_concurrent_fetches = pool.max_concurrent();
        self.shared_slots = Some(pool);
        self
    }

    /// The shared slot pool, if batches share one.
    pub fn shared_slots(&self) -> Option<&Arc<FetchSlotPool>> {
        self.shared_slots.as_ref()
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    /// Checks the batch shape without touching any capacity.
    pub fn validate(&self, targets: &[String]) -> Result<(), ValidationError> {
        if targets.is_empty() {
            return Err(ValidationError::Empty);
        }
        if targets.len() > self.max_batch_size {
            return Err(ValidationError::TooLarge {
                size: targets.len(),
                max: self.max_batch_size,
            });
        }
        Ok(())
    }

    /// Fetches every target and returns the complete mapping, or the error
    /// that ended the batch.
    ///
    /// Cancelling `parent` (or dropping the returned future) cancels every
    /// fetch of the batch. No fetch task outlives this call.
    pub async fn process(
        &self,
        targets: Vec<String>,
        parent: &CancellationToken,
    ) -> Result<BatchResult, BatchError> {
        let start = Instant::now();
        let span = info_span!("batch", batch_id = %Uuid::new_v4(), targets = targets.len());

        let result = self.run(targets, parent).instrument(span.clone()).await;

        let label = match &result {
            Ok(_) => "success",
            Err(e) => e.label(),
        };
        record_batch(label, start.elapsed());
        span.in_scope(|| match &result {
            Ok(results) => info!(
                entries = results.len(),
                duration_ms = start.elapsed().as_millis() as u64,
                "Batch completed"
            ),
            Err(e) => info!(outcome = label, error = %e, "Batch failed"),
        });

        result
    }

    async fn run(
        &self,
        targets: Vec<String>,
        parent: &CancellationToken,
    ) -> Result<BatchResult, BatchError> {
        self.validate(&targets)?;
        BATCH_SIZE.observe(targets.len() as f64);

        let scope = parent.child_token();
        let _cancel_on_drop = scope.clone().drop_guard();
        let outcome = Arc::new(FirstError::default());
        let slots = match &self.shared_slots {
            Some(pool) => Arc::clone(pool),
            None => Arc::new(FetchSlotPool::new(self.max_concurrent_fetches)),
        };

        let fan_in = self.fan_out(targets, &scope, &slots, &outcome);
        tokio::pin!(fan_in);

        let collected = tokio::select! {
            collected = &mut fan_in => collected,
            _ = tokio::time::sleep(self.batch_timeout) => {
                warn!(
                    timeout_ms = self.batch_timeout.as_millis() as u64,
                    "Batch deadline exceeded, cancelling fetches"
                );
                outcome.record(BatchError::DeadlineExceeded {
                    timeout_ms: self.batch_timeout.as_millis() as u64,
                });
                scope.cancel();
                // Keep joining so no fetch outlives the batch
                fan_in.await
            }
        };

        if scope.is_cancelled() {
            debug!(discarded = collected.len(), "Discarding partial results");
            return Err(outcome.get().unwrap_or(BatchError::Cancelled));
        }

        Ok(collected)
    }

    /// Spawns one task per target under the slot limit, joins them all, then
    /// drains the collector.
    async fn fan_out(
        &self,
        targets: Vec<String>,
        scope: &CancellationToken,
        slots: &Arc<FetchSlotPool>,
        outcome: &Arc<FirstError>,
    ) -> BatchResult {
        let (tx, mut rx) = mpsc::channel(targets.len().max(1));
        let mut tasks = JoinSet::new();

        for target in targets {
            let slot = tokio::select! {
                biased;
                _ = scope.cancelled() => {
                    debug!("Scope cancelled, not starting remaining fetches");
                    break;
                }
                slot = slots.acquire() => match slot {
                    Ok(slot) => slot,
                    Err(_) => {
                        outcome.record(BatchError::Internal("fetch slot pool closed".to_string()));
                        scope.cancel();
                        break;
                    }
                },
            };

            tasks.spawn(
                run_fetch(FetchTask {
                    fetcher: Arc::clone(&self.fetcher),
                    target,
                    scope: scope.clone(),
                    timeout: self.fetch_timeout,
                    outcome: Arc::clone(outcome),
                    results: tx.clone(),
                    slot,
                })
                .in_current_span(),
            );
        }
        drop(tx);

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                if e.is_panic() {
                    warn!(error = %e, "Fetch task panicked");
                    outcome.record(BatchError::Internal(format!("fetch task panicked: {}", e)));
                    scope.cancel();
                }
            }
        }

        // Every sender is gone once the tasks are joined
        let mut results = HashMap::new();
        while let Some((target, value)) = rx.recv().await {
            results.insert(target, value);
        }
        results
    }
}

async fn run_fetch(task: FetchTask) {
    let FetchTask {
        fetcher,
        target,
        scope,
        timeout,
        outcome,
        results,
        slot: _slot,
    } = task;

    if scope.is_cancelled() {
        FETCHES_TOTAL.with_label_values(&["skipped"]).inc();
        return;
    }

    let start = Instant::now();
    let result = tokio::select! {
        biased;
        _ = scope.cancelled() => {
            record_fetch("cancelled", start.elapsed());
            return;
        }
        result = fetcher.fetch(&target, &scope, timeout) => result,
    };

    // Anything arriving after cancellation never reaches the collector
    if scope.is_cancelled() {
        debug!(url = %target, "Discarding fetch result after cancellation");
        record_fetch("cancelled", start.elapsed());
        return;
    }

    match result {
        Ok(value) => {
            record_fetch("success", start.elapsed());
            debug!(url = %target, "Fetch succeeded");
            let _ = results.send((target, value)).await;
        }
        Err(e) => {
            record_fetch("error", start.elapsed());
            warn!(url = %target, error = %e.kind, "Fetch failed, cancelling batch");
            outcome.record(BatchError::Fetch(e));
            scope.cancel();
        }
    }
}

fn record_fetch(status: &str, elapsed: Duration) {
    FETCHES_TOTAL.with_label_values(&[status]).inc();
    FETCH_DURATION
        .with_label_values(&[status])
        .observe(elapsed.as_secs_f64());
}

pub(crate) fn record_batch(result: &str, elapsed: Duration) {
    BATCHES_TOTAL.with_label_values(&[result]).inc();
    BATCH_DURATION
        .with_label_values(&[result])
        .observe(elapsed.as_secs_f64());
}
