//! Inbound admission control.
//!
//! Bounds the number of batches serviced at once. Excess arrivals are shed
//! immediately rather than queued.

mod gate;

pub use gate::{AdmissionGate, AdmissionTicket, GateStatus};
