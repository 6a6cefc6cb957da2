//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod scan;
pub mod ticket;

pub use scan::{ScanEntity, ScanOutcomeDb, ScanSourceDb};
pub use ticket::TicketWithContextEntity;
