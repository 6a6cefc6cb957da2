//! Scan models: request/response types and the outcome taxonomy.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

/// Where a scan originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanSource {
    Live,
    Offline,
}

/// Final classification of a resolved scan attempt.
///
/// Every scan, accepted or rejected, resolves to exactly one of these and is
/// recorded in the audit trail under it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanOutcome {
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

impl ScanOutcome {
    /// Whether this outcome admitted anyone.
    pub fn is_accepted(self) -> bool {
        matches!(
            self,
            ScanOutcome::PartiallyAdmitted | ScanOutcome::FullyAdmitted
        )
    }

    /// Expected-under-contention outcomes operators should not treat as faults.
    pub fn is_benign_duplicate(self) -> bool {
        matches!(
            self,
            ScanOutcome::AlreadyFullyAdmitted | ScanOutcome::Conflict
        )
    }

    /// Short operator-facing message shown on the scanning device.
    pub fn operator_message(self) -> &'static str {
        match self {
            ScanOutcome::PartiallyAdmitted => "admitted; ticket still has remaining guests",
            ScanOutcome::FullyAdmitted => "admitted; all guests have now entered",
            ScanOutcome::AlreadyFullyAdmitted => "all guests already entered",
            ScanOutcome::Conflict => "another scanner admitted these guests first; rescan to confirm",
            ScanOutcome::Forged => "token could not be verified",
            ScanOutcome::Expired => "ticket has expired",
            ScanOutcome::OutsideEventWindow => "ticket not valid today",
            ScanOutcome::EventMismatch => "ticket belongs to a different event",
            ScanOutcome::NotConfirmed => "guest has not confirmed attendance",
            ScanOutcome::InvalidQuantity => "requested entry count is not available on this ticket",
            ScanOutcome::TicketNotFound => "ticket not found; contact the event organizer",
        }
    }

    /// Metric label for `admission_scans_total`.
    pub fn as_str(self) -> &'static str {
        match self {
            ScanOutcome::PartiallyAdmitted => "partially_admitted",
            ScanOutcome::FullyAdmitted => "fully_admitted",
            ScanOutcome::AlreadyFullyAdmitted => "already_fully_admitted",
            ScanOutcome::Conflict => "conflict",
            ScanOutcome::Forged => "forged",
            ScanOutcome::Expired => "expired",
            ScanOutcome::OutsideEventWindow => "outside_event_window",
            ScanOutcome::EventMismatch => "event_mismatch",
            ScanOutcome::NotConfirmed => "not_confirmed",
            ScanOutcome::InvalidQuantity => "invalid_quantity",
            ScanOutcome::TicketNotFound => "ticket_not_found",
        }
    }
}

/// Typed rejection from the codec or the validator.
///
/// Maps 1:1 onto a rejected [`ScanOutcome`]; never coerced into a generic
/// failure on the way to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("token signature is invalid")]
    Forged,

    #[error("token has expired")]
    Expired,

    #[error("token is outside the event's calendar day")]
    OutsideEventWindow,

    #[error("ticket does not belong to this event")]
    EventMismatch,

    #[error("guest RSVP is not confirmed")]
    NotConfirmed,

    #[error("ticket has no remaining entries")]
    AlreadyFullyAdmitted,

    #[error("requested entry quantity is invalid")]
    InvalidQuantity,

    #[error("capacity was consumed by a concurrent scan")]
    Conflict,

    #[error("ticket does not exist")]
    TicketNotFound,
}

impl Rejection {
    pub fn outcome(self) -> ScanOutcome {
        match self {
            Rejection::Forged => ScanOutcome::Forged,
            Rejection::Expired => ScanOutcome::Expired,
            Rejection::OutsideEventWindow => ScanOutcome::OutsideEventWindow,
            Rejection::EventMismatch => ScanOutcome::EventMismatch,
            Rejection::NotConfirmed => ScanOutcome::NotConfirmed,
            Rejection::AlreadyFullyAdmitted => ScanOutcome::AlreadyFullyAdmitted,
            Rejection::InvalidQuantity => ScanOutcome::InvalidQuantity,
            Rejection::Conflict => ScanOutcome::Conflict,
            Rejection::TicketNotFound => ScanOutcome::TicketNotFound,
        }
    }
}

/// Inbound live scan request.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct LiveScanRequest {
    pub token: String,

    /// Event the scanning gate is admitting for; must match the ticket.
    pub event_id: Uuid,

    /// Staff identity operating the scanner.
    #[validate(length(min = 1, max = 100, message = "scanned_by must be 1-100 characters"))]
    pub scanned_by: String,

    /// Scan instant in milliseconds since epoch, from the scanner's clock.
    pub scanned_at: i64,

    /// People to admit in this scan; omitted means everyone still remaining.
    #[validate(range(min = 1, max = 10, message = "entry_quantity must be between 1 and 10"))]
    pub entry_quantity: Option<i32>,

    /// Names of the individuals entering; must match entry quantity when given.
    pub entered_names: Option<Vec<String>>,
}

/// Outcome payload returned for every resolved scan.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ScanResponse {
    pub accepted: bool,
    pub outcome: ScanOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_count: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entered_names: Option<Vec<String>>,
    pub message: String,
}

/// One queued scan uploaded by an offline-capable scanner.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct OfflineScanItem {
    /// Client-generated idempotency key, unique per queued scan.
    #[validate(length(min = 1, max = 128, message = "local_id must be 1-128 characters"))]
    pub local_id: String,

    pub token: String,

    pub event_id: Uuid,

    #[validate(length(min = 1, max = 100, message = "scanned_by must be 1-100 characters"))]
    pub scanned_by: String,

    /// When the scan physically happened at the gate, milliseconds since epoch.
    pub scanned_at: i64,

    #[validate(range(min = 1, max = 10, message = "entry_quantity must be between 1 and 10"))]
    pub entry_quantity: Option<i32>,

    pub entered_names: Option<Vec<String>>,
}

/// Inbound offline reconciliation batch.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct SyncBatchRequest {
    #[validate(length(min = 1, message = "batch must contain at least one scan"))]
    pub scans: Vec<OfflineScanItem>,
}

/// Per-item reconciliation result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct SyncItemResult {
    pub local_id: String,
    pub accepted: bool,
    /// Absent only when the item could not be resolved (internal error);
    /// such items are safe to retry in a later batch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ScanOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_count: Option<i32>,
    pub message: String,
}

/// Response for an offline reconciliation batch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct SyncBatchResponse {
    pub synced_count: usize,
    pub failed_count: usize,
    pub results: Vec<SyncItemResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepted_classification() {
        assert!(ScanOutcome::PartiallyAdmitted.is_accepted());
        assert!(ScanOutcome::FullyAdmitted.is_accepted());
        assert!(!ScanOutcome::AlreadyFullyAdmitted.is_accepted());
        assert!(!ScanOutcome::Forged.is_accepted());
    }

    #[test]
    fn test_benign_duplicate_classification() {
        assert!(ScanOutcome::AlreadyFullyAdmitted.is_benign_duplicate());
        assert!(ScanOutcome::Conflict.is_benign_duplicate());
        assert!(!ScanOutcome::Forged.is_benign_duplicate());
        assert!(!ScanOutcome::NotConfirmed.is_benign_duplicate());
        assert!(!ScanOutcome::FullyAdmitted.is_benign_duplicate());
    }

    #[test]
    fn test_every_outcome_has_operator_message() {
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
            assert!(!outcome.operator_message().is_empty());
            assert_eq!(
                serde_json::to_string(&outcome).unwrap(),
                format!("\"{}\"", outcome.as_str())
            );
        }
    }

    #[test]
    fn test_rejection_maps_to_outcome() {
        assert_eq!(Rejection::Forged.outcome(), ScanOutcome::Forged);
        assert_eq!(
            Rejection::AlreadyFullyAdmitted.outcome(),
            ScanOutcome::AlreadyFullyAdmitted
        );
        assert_eq!(Rejection::Conflict.outcome(), ScanOutcome::Conflict);
        assert_eq!(
            Rejection::TicketNotFound.outcome(),
            ScanOutcome::TicketNotFound
        );
    }

    #[test]
    fn test_live_scan_request_validation() {
        let valid = LiveScanRequest {
            token: "abc".into(),
            event_id: Uuid::new_v4(),
            scanned_by: "gate-1".into(),
            scanned_at: 1,
            entry_quantity: Some(2),
            entered_names: None,
        };
        assert!(valid.validate().is_ok());

        let zero_quantity = LiveScanRequest {
            entry_quantity: Some(0),
            ..valid.clone()
        };
        assert!(zero_quantity.validate().is_err());

        let oversized = LiveScanRequest {
            entry_quantity: Some(11),
            ..valid.clone()
        };
        assert!(oversized.validate().is_err());

        let anonymous = LiveScanRequest {
            scanned_by: String::new(),
            ..valid
        };
        assert!(anonymous.validate().is_err());
    }

    #[test]
    fn test_sync_batch_request_rejects_empty() {
        let empty = SyncBatchRequest { scans: vec![] };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_scan_response_omits_absent_fields() {
        let response = ScanResponse {
            accepted: false,
            outcome: ScanOutcome::Forged,
            remaining_count: None,
            entered_names: None,
            message: ScanOutcome::Forged.operator_message().to_string(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("remaining_count").is_none());
        assert!(json.get("entered_names").is_none());
        assert_eq!(json["outcome"], "forged");
    }
}
