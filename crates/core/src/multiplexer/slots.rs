//! Outbound fetch concurrency limiter.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

use crate::metrics::FETCHES_IN_FLIGHT;

/// Snapshot of a fetch slot pool.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SlotPoolStatus {
    pub max_concurrent: usize,
    pub in_flight: usize,
    pub peak_in_flight: usize,
    pub total_acquired: u64,
}

#[derive(Debug, Default)]
struct SlotStats {
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    total_acquired: AtomicU64,
}

/// Pool of fetch slots.
///
/// A fetch holds one slot from before it starts until it exits, so at most
/// `max_concurrent` fetches drawing from the same pool are ever in flight.
#[derive(Debug)]
pub struct FetchSlotPool {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
    stats: Arc<SlotStats>,
}

impl FetchSlotPool {
    /// # Panics
    ///
    /// Panics if `max_concurrent` is 0.
    pub fn new(max_concurrent: usize) -> Self {
        assert!(max_concurrent > 0, "max_concurrent must be > 0");

        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            stats: Arc::new(SlotStats::default()),
        }
    }

    /// Waits for a free slot.
    pub async fn acquire(&self) -> Result<FetchSlot, AcquireError> {
        let permit = Arc::clone(&self.semaphore).acquire_owned().await?;

        let current = self.stats.in_flight.fetch_add(1, Ordering::Relaxed) + 1;
        self.stats.total_acquired.fetch_add(1, Ordering::Relaxed);
        self.stats
            .peak_in_flight
            .fetch_max(current, Ordering::Relaxed);
        FETCHES_IN_FLIGHT.inc();

        Ok(FetchSlot {
            _permit: permit,
            stats: Arc::clone(&self.stats),
        })
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn in_flight(&self) -> usize {
        self.stats.in_flight.load(Ordering::Relaxed)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.stats.peak_in_flight.load(Ordering::Relaxed)
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn status(&self) -> SlotPoolStatus {
        SlotPoolStatus {
            max_concurrent: self.max_concurrent,
            in_flight: self.in_flight(),
            peak_in_flight: self.peak_in_flight(),
            total_acquired: self.stats.total_acquired.load(Ordering::Relaxed),
        }
    }
}

/// Permission for one fetch to be in flight. Released on drop.
#[derive(Debug)]
pub struct FetchSlot {
    _permit: OwnedSemaphorePermit,
    stats: Arc<SlotStats>,
}

impl Drop for FetchSlot {
    fn drop(&mut self) {
        self.stats.in_flight.fetch_sub(1, Ordering::Relaxed);
        FETCHES_IN_FLIGHT.dec();
    }
}
