//! Domain models for the Gatelist backend.

pub mod scan;
pub mod ticket;

pub use scan::{Rejection, ScanOutcome, ScanSource};
pub use ticket::{AdmissionState, TicketSnapshot};
