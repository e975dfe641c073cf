//! Batch fan-out / fan-in with all-or-nothing semantics.
//!
//! One fetch task per target, bounded by a `FetchSlotPool`, coordinated by a
//! single cancellation scope per batch. Results are only returned when every
//! fetch succeeded.

mod runner;
mod slots;
mod types;

pub(crate) use runner::record_batch;
pub use runner::BatchMultiplexer;
pub use slots::{FetchSlot, FetchSlotPool, SlotPoolStatus};
pub use types::*;
