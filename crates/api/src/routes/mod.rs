//! HTTP route handlers.

pub mod health;
pub mod scans;
pub mod tickets;
