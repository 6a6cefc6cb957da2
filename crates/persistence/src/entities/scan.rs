//! Scan entity (the immutable audit trail) and database enum mappings.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use domain::models::scan::{ScanOutcome, ScanSource};

/// Database enum for scan_outcome that maps to the PostgreSQL enum type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "scan_outcome", rename_all = "snake_case")]
pub enum ScanOutcomeDb {
    PartiallyAdmitted,
    FullyAdmitted,
    AlreadyFullyAdmitted,
    Conflict,
    Forged,
    Expired,
    OutsideEventWindow,
    EventMismatch,
    NotConfirmed,
    InvalidQuantity,
    TicketNotFound,
}

impl From<ScanOutcomeDb> for ScanOutcome {
    fn from(db: ScanOutcomeDb) -> Self {
        match db {
            ScanOutcomeDb::PartiallyAdmitted => ScanOutcome::PartiallyAdmitted,
            ScanOutcomeDb::FullyAdmitted => ScanOutcome::FullyAdmitted,
            ScanOutcomeDb::AlreadyFullyAdmitted => ScanOutcome::AlreadyFullyAdmitted,
            ScanOutcomeDb::Conflict => ScanOutcome::Conflict,
            ScanOutcomeDb::Forged => ScanOutcome::Forged,
            ScanOutcomeDb::Expired => ScanOutcome::Expired,
            ScanOutcomeDb::OutsideEventWindow => ScanOutcome::OutsideEventWindow,
            ScanOutcomeDb::EventMismatch => ScanOutcome::EventMismatch,
            ScanOutcomeDb::NotConfirmed => ScanOutcome::NotConfirmed,
            ScanOutcomeDb::InvalidQuantity => ScanOutcome::InvalidQuantity,
            ScanOutcomeDb::TicketNotFound => ScanOutcome::TicketNotFound,
        }
    }
}

impl From<ScanOutcome> for ScanOutcomeDb {
    fn from(outcome: ScanOutcome) -> Self {
        match outcome {
            ScanOutcome::PartiallyAdmitted => ScanOutcomeDb::PartiallyAdmitted,
            ScanOutcome::FullyAdmitted => ScanOutcomeDb::FullyAdmitted,
            ScanOutcome::AlreadyFullyAdmitted => ScanOutcomeDb::AlreadyFullyAdmitted,
            ScanOutcome::Conflict => ScanOutcomeDb::Conflict,
            ScanOutcome::Forged => ScanOutcomeDb::Forged,
            ScanOutcome::Expired => ScanOutcomeDb::Expired,
            ScanOutcome::OutsideEventWindow => ScanOutcomeDb::OutsideEventWindow,
            ScanOutcome::EventMismatch => ScanOutcomeDb::EventMismatch,
            ScanOutcome::NotConfirmed => ScanOutcomeDb::NotConfirmed,
            ScanOutcome::InvalidQuantity => ScanOutcomeDb::InvalidQuantity,
            ScanOutcome::TicketNotFound => ScanOutcomeDb::TicketNotFound,
        }
    }
}

/// Database enum for scan_source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "scan_source", rename_all = "lowercase")]
pub enum ScanSourceDb {
    Live,
    Offline,
}

impl From<ScanSourceDb> for ScanSource {
    fn from(db: ScanSourceDb) -> Self {
        match db {
            ScanSourceDb::Live => ScanSource::Live,
            ScanSourceDb::Offline => ScanSource::Offline,
        }
    }
}

impl From<ScanSource> for ScanSourceDb {
    fn from(source: ScanSource) -> Self {
        match source {
            ScanSource::Live => ScanSourceDb::Live,
            ScanSource::Offline => ScanSourceDb::Offline,
        }
    }
}

/// Database row mapping for the scans table.
///
/// `ticket_id`/`event_id` are nullable and unconstrained: the audit trail
/// must record scans whose token claims could not be decoded or reference
/// rows that do not exist.
#[derive(Debug, Clone, FromRow)]
pub struct ScanEntity {
    pub id: Uuid,
    pub ticket_id: Option<Uuid>,
    pub event_id: Option<Uuid>,
    pub scanned_by: String,
    pub scanned_at: DateTime<Utc>,
    pub outcome: ScanOutcomeDb,
    pub entry_count: i32,
    pub entered_names: Vec<String>,
    pub remaining_after: Option<i32>,
    pub source: ScanSourceDb,
    pub local_id: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_round_trips_through_db_enum() {
        let outcomes = [
            ScanOutcome::PartiallyAdmitted,
            ScanOutcome::FullyAdmitted,
            ScanOutcome::AlreadyFullyAdmitted,
            ScanOutcome::Conflict,
            ScanOutcome::Forged,
            ScanOutcome::Expired,
            ScanOutcome::OutsideEventWindow,
            ScanOutcome::EventMismatch,
            ScanOutcome::NotConfirmed,
            ScanOutcome::InvalidQuantity,
            ScanOutcome::TicketNotFound,
        ];
        for outcome in outcomes {
            let db: ScanOutcomeDb = outcome.into();
            let back: ScanOutcome = db.into();
            assert_eq!(back, outcome);
        }
    }

    #[test]
    fn test_source_round_trips_through_db_enum() {
        for source in [ScanSource::Live, ScanSource::Offline] {
            let db: ScanSourceDb = source.into();
            let back: ScanSource = db.into();
            assert_eq!(back, source);
        }
    }
}
