//! Shared utilities and common types for the Gatelist backend.
//!
//! This crate provides common functionality used across all other crates:
//! - The redemption token codec (signed, time-bounded credentials)
//! - Event-day arithmetic in the venue's reference timezone
//! - Cryptographic utilities (hashing, secret fingerprinting)

pub mod crypto;
pub mod event_day;
pub mod token;
