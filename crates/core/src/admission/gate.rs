//! Fixed-capacity ticket pool bounding concurrent batches.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use crate::metrics::{ADMISSION_REJECTIONS, BATCHES_IN_FLIGHT};

/// Snapshot of the admission gate.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GateStatus {
    pub capacity: usize,
    pub in_use: usize,
    pub available: usize,
    pub total_admitted: u64,
    pub total_rejected: u64,
}

#[derive(Debug, Default)]
struct GateStats {
    admitted: AtomicU64,
    rejected: AtomicU64,
}

/// Admission gate for batches.
///
/// Never queues: [`try_acquire`](Self::try_acquire) either hands out a ticket
/// immediately or reports exhaustion. The ticket gives its capacity back when
/// dropped, so every exit path of the batch releases it exactly once.
#[derive(Debug)]
pub struct AdmissionGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    stats: GateStats,
}

impl AdmissionGate {
    /// Creates a gate admitting at most `capacity` concurrent batches.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "admission capacity must be > 0");

        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            stats: GateStats::default(),
        }
    }

    /// Tries to admit one batch without waiting.
    ///
    /// Returns `None` when the gate is at capacity.
    pub fn try_acquire(&self) -> Option<AdmissionTicket> {
        match Arc::clone(&self.semaphore).try_acquire_owned() {
            Ok(permit) => {
                self.stats.admitted.fetch_add(1, Ordering::Relaxed);
                BATCHES_IN_FLIGHT.inc();
                Some(AdmissionTicket { _permit: permit })
            }
            Err(_) => {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                ADMISSION_REJECTIONS.inc();
                debug!(capacity = self.capacity, "Admission gate exhausted");
                None
            }
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn in_use(&self) -> usize {
        self.capacity - self.available()
    }

    pub fn status(&self) -> GateStatus {
        let available = self.available();
        GateStatus {
            capacity: self.capacity,
            in_use: self.capacity - available,
            available,
            total_admitted: self.stats.admitted.load(Ordering::Relaxed),
            total_rejected: self.stats.rejected.load(Ordering::Relaxed),
        }
    }
}

/// One unit of admission capacity, held for the whole life of a batch.
#[must_use = "dropping the ticket releases the admission slot immediately"]
#[derive(Debug)]
pub struct AdmissionTicket {
    _permit: OwnedSemaphorePermit,
}

impl Drop for AdmissionTicket {
    fn drop(&mut self) {
        BATCHES_IN_FLIGHT.dec();
    }
}
