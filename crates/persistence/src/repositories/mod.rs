//! Repository implementations for database operations.

pub mod scan;
pub mod ticket;

pub use scan::{RejectionRecord, ScanRepository};
pub use ticket::{AdmitInput, AdmitOutcome, TicketRepository};
