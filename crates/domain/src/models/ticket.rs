//! Ticket domain models and the per-ticket admission lifecycle.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use shared::token::TicketFacts;

use super::scan::{ScanOutcome, ScanSource};

/// Authoritative snapshot of a ticket and its event/guest context, as read
/// from the invitation store at validation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketSnapshot {
    pub ticket_id: Uuid,
    pub event_id: Uuid,
    pub guest_id: Uuid,
    pub party_size: i32,
    pub remaining_count: i32,
    /// Owned by the external RSVP subsystem; read-only here.
    pub rsvp_confirmed: bool,
    /// Calendar date of the event in the reference timezone.
    pub occurs_on: NaiveDate,
}

impl TicketSnapshot {
    /// Current admission state derived from the counters.
    pub fn state(&self) -> AdmissionState {
        AdmissionState::from_counts(self.party_size, self.remaining_count)
    }
}

impl From<&TicketSnapshot> for TicketFacts {
    fn from(snapshot: &TicketSnapshot) -> Self {
        TicketFacts {
            ticket_id: snapshot.ticket_id,
            event_id: snapshot.event_id,
            guest_id: snapshot.guest_id,
            party_size: snapshot.party_size,
            remaining_count: snapshot.remaining_count,
            occurs_on: snapshot.occurs_on,
        }
    }
}

/// Per-ticket admission lifecycle, derived from the counters.
///
/// Transitions happen only through committed admission transactions and only
/// move forward; `FullyAdmitted` is terminal within this engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionState {
    Untouched,
    PartiallyAdmitted,
    FullyAdmitted,
}

impl AdmissionState {
    pub fn from_counts(party_size: i32, remaining_count: i32) -> Self {
        if remaining_count == 0 {
            AdmissionState::FullyAdmitted
        } else if remaining_count >= party_size {
            AdmissionState::Untouched
        } else {
            AdmissionState::PartiallyAdmitted
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, AdmissionState::FullyAdmitted)
    }
}

/// Response after issuing a redemption token.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct IssueTokenResponse {
    pub ticket_id: Uuid,
    pub event_id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub party_size: i32,
    pub remaining_count: i32,
}

/// One past scan shown in the operator status view.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ScanHistoryItem {
    pub scan_id: Uuid,
    pub scanned_by: String,
    pub scanned_at: DateTime<Utc>,
    pub outcome: ScanOutcome,
    pub entry_count: i32,
    pub entered_names: Vec<String>,
    pub source: ScanSource,
}

/// Operator-facing ticket status with its audit trail.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct TicketStatusResponse {
    pub ticket_id: Uuid,
    pub event_id: Uuid,
    pub guest_id: Uuid,
    pub guest_name: String,
    pub party_size: i32,
    pub remaining_count: i32,
    pub state: AdmissionState,
    pub rsvp_confirmed: bool,
    pub occurs_on: NaiveDate,
    pub scans: Vec<ScanHistoryItem>,
}
