//! Scan orchestration: verify, validate, then admit atomically.
//!
//! One pipeline serves live scans and offline reconciliation. Every resolved
//! attempt, accepted or rejected, lands in the scans audit trail; rejections
//! come back as typed outcomes with operator-facing messages, never as
//! generic failures.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use domain::models::scan::{
    Rejection, ScanOutcome, ScanResponse, ScanSource, SyncBatchResponse, SyncItemResult,
};
use domain::services::admission;
use persistence::db::is_unique_violation;
use persistence::entities::{ScanEntity, ScanSourceDb};
use persistence::repositories::{
    AdmitInput, AdmitOutcome, RejectionRecord, ScanRepository, TicketRepository,
};
use shared::token::{TokenCodec, TokenError};

use crate::middleware::metrics::{record_guests_admitted, record_scan_outcome};

/// A live scan after request-level parsing.
#[derive(Debug, Clone)]
pub struct LiveScanInput {
    pub token: String,
    pub gate_event_id: Uuid,
    pub scanned_by: String,
    pub scanned_at: DateTime<Utc>,
    pub entry_quantity: Option<i32>,
    pub entered_names: Option<Vec<String>>,
}

/// One queued offline scan after request-level parsing.
#[derive(Debug, Clone)]
pub struct OfflineScanInput {
    pub local_id: String,
    pub token: String,
    pub gate_event_id: Uuid,
    pub scanned_by: String,
    pub scanned_at: DateTime<Utc>,
    pub entry_quantity: Option<i32>,
    pub entered_names: Option<Vec<String>>,
}

/// One scan attempt flowing through the pipeline, live or replayed.
#[derive(Debug, Clone)]
struct ScanAttempt {
    token: String,
    gate_event_id: Uuid,
    scanned_by: String,
    scanned_at: DateTime<Utc>,
    entry_quantity: Option<i32>,
    entered_names: Option<Vec<String>>,
    source: ScanSourceDb,
    local_id: Option<String>,
}

impl ScanAttempt {
    fn scan_source(&self) -> ScanSource {
        self.source.into()
    }
}

/// Drives the admission pipeline against the ticket store.
#[derive(Clone)]
pub struct ScanService {
    tickets: TicketRepository,
    scans: ScanRepository,
    codec: Arc<TokenCodec>,
}

impl ScanService {
    pub fn new(pool: PgPool, codec: Arc<TokenCodec>) -> Self {
        Self {
            tickets: TicketRepository::new(pool.clone()),
            scans: ScanRepository::new(pool),
            codec,
        }
    }

    /// Resolve one live scan. Duplicate suppression does not apply here:
    /// a retried live scan is a genuine new physical event.
    pub async fn process_live(&self, input: LiveScanInput) -> Result<ScanResponse, sqlx::Error> {
        self.process(ScanAttempt {
            token: input.token,
            gate_event_id: input.gate_event_id,
            scanned_by: input.scanned_by,
            scanned_at: input.scanned_at,
            entry_quantity: input.entry_quantity,
            entered_names: input.entered_names,
            source: ScanSourceDb::Live,
            local_id: None,
        })
        .await
    }

    /// Replay a batch of offline scans through the live pipeline, oldest
    /// first, idempotently by `local_id`.
    ///
    /// One item's failure never aborts the batch; unresolved items are
    /// reported without an outcome and are safe to retry. Items that lost to
    /// an earlier admission are surfaced, not hidden: the physical
    /// over-admission already happened at the gate and operators need to
    /// know.
    pub async fn reconcile(&self, mut items: Vec<OfflineScanInput>) -> SyncBatchResponse {
        // Replay in the order the scans physically happened at the gate:
        // which scan was first determines which one legitimately exhausts
        // the ticket.
        items.sort_by_key(|item| item.scanned_at);

        let mut results = Vec::with_capacity(items.len());
        let mut synced_count = 0;
        let mut failed_count = 0;
        let mut lost_races = 0;

        for item in items {
            let local_id = item.local_id.clone();
            match self.reconcile_item(item).await {
                Ok(response) => {
                    synced_count += 1;
                    if response.outcome.is_benign_duplicate() {
                        lost_races += 1;
                    }
                    results.push(SyncItemResult {
                        local_id,
                        accepted: response.accepted,
                        outcome: Some(response.outcome),
                        remaining_count: response.remaining_count,
                        message: response.message,
                    });
                }
                Err(err) => {
                    failed_count += 1;
                    error!(
                        local_id = %local_id,
                        error = %err,
                        "Failed to reconcile offline scan; item can be retried"
                    );
                    results.push(SyncItemResult {
                        local_id,
                        accepted: false,
                        outcome: None,
                        remaining_count: None,
                        message: "internal error; retry this item in a later sync".to_string(),
                    });
                }
            }
        }

        if lost_races > 0 {
            warn!(
                count = lost_races,
                "Offline reconciliation found scans that lost to earlier admissions; \
                 the gate may have over-admitted while devices were disconnected"
            );
        }

        SyncBatchResponse {
            synced_count,
            failed_count,
            results,
        }
    }

    async fn reconcile_item(&self, item: OfflineScanInput) -> Result<ScanResponse, sqlx::Error> {
        if let Some(existing) = self.scans.find_by_local_id(&item.local_id).await? {
            info!(
                local_id = %item.local_id,
                "Offline scan already reconciled; returning recorded outcome"
            );
            return Ok(scan_response(&existing));
        }

        self.process(ScanAttempt {
            token: item.token,
            gate_event_id: item.gate_event_id,
            scanned_by: item.scanned_by,
            scanned_at: item.scanned_at,
            entry_quantity: item.entry_quantity,
            entered_names: item.entered_names,
            source: ScanSourceDb::Offline,
            local_id: Some(item.local_id),
        })
        .await
    }

    /// The full pipeline for one scan: token verification, authoritative
    /// ticket read, pure decision, atomic transaction.
    async fn process(&self, attempt: ScanAttempt) -> Result<ScanResponse, sqlx::Error> {
        let claims = match self.codec.verify(&attempt.token) {
            Ok(claims) => claims,
            Err(TokenError::Forged) | Err(TokenError::Encoding(_)) => {
                // Nothing in the token can be trusted; audit under the gate's
                // event only.
                let gate = attempt.gate_event_id;
                return self
                    .reject(&attempt, None, Some(gate), Rejection::Forged, None)
                    .await;
            }
            Err(TokenError::Expired { claims }) => {
                let ticket_id = claims.ticket_id().ok();
                return self
                    .reject(&attempt, ticket_id, Some(claims.event_id), Rejection::Expired, None)
                    .await;
            }
            Err(TokenError::OutsideEventWindow { claims }) => {
                let ticket_id = claims.ticket_id().ok();
                return self
                    .reject(
                        &attempt,
                        ticket_id,
                        Some(claims.event_id),
                        Rejection::OutsideEventWindow,
                        None,
                    )
                    .await;
            }
        };

        let ticket_id = match claims.ticket_id() {
            Ok(id) => id,
            Err(_) => {
                return self
                    .reject(&attempt, None, Some(claims.event_id), Rejection::Forged, None)
                    .await;
            }
        };

        let Some(context) = self.tickets.find_with_context(ticket_id).await? else {
            // A validly signed token for a row that no longer exists is a
            // data-integrity problem, not a bad scan.
            error!(ticket_id = %ticket_id, "Scanned token references a missing ticket");
            return self
                .reject(
                    &attempt,
                    Some(ticket_id),
                    Some(claims.event_id),
                    Rejection::TicketNotFound,
                    None,
                )
                .await;
        };
        let snapshot = context.snapshot();

        let admission = match admission::evaluate(
            &snapshot,
            claims.event_id,
            attempt.gate_event_id,
            attempt.entry_quantity,
            attempt.entered_names.as_deref(),
        ) {
            Ok(admission) => admission,
            Err(rejection) => {
                return self
                    .reject(
                        &attempt,
                        Some(ticket_id),
                        Some(snapshot.event_id),
                        rejection,
                        Some(snapshot.remaining_count),
                    )
                    .await;
            }
        };

        let admit_result = self
            .tickets
            .admit(AdmitInput {
                ticket_id,
                entry_quantity: admission.entry_quantity,
                entered_names: attempt.entered_names.clone(),
                scanned_by: attempt.scanned_by.clone(),
                scanned_at: attempt.scanned_at,
                source: attempt.source,
                local_id: attempt.local_id.clone(),
            })
            .await;

        match admit_result {
            Ok(AdmitOutcome::Admitted {
                scan,
                remaining_after,
            }) => {
                let outcome: ScanOutcome = scan.outcome.into();
                record_scan_outcome(outcome, attempt.scan_source());
                record_guests_admitted(scan.entry_count);
                info!(
                    ticket_id = %ticket_id,
                    outcome = outcome.as_str(),
                    entry_count = scan.entry_count,
                    remaining_count = remaining_after,
                    scanned_by = %attempt.scanned_by,
                    "Admission committed"
                );
                Ok(scan_response(&scan))
            }
            Ok(AdmitOutcome::InsufficientRemaining { remaining }) => {
                // Expected under contention: another scanner won the
                // transaction race after our validation read.
                let rejection = if remaining == 0 {
                    Rejection::AlreadyFullyAdmitted
                } else {
                    Rejection::Conflict
                };
                self.reject(
                    &attempt,
                    Some(ticket_id),
                    Some(snapshot.event_id),
                    rejection,
                    Some(remaining),
                )
                .await
            }
            Ok(AdmitOutcome::TicketMissing) => {
                error!(ticket_id = %ticket_id, "Ticket disappeared inside the admission transaction");
                self.reject(
                    &attempt,
                    Some(ticket_id),
                    Some(snapshot.event_id),
                    Rejection::TicketNotFound,
                    None,
                )
                .await
            }
            Err(err) if is_unique_violation(&err) => self.previously_recorded(&attempt, err).await,
            Err(err) => Err(err),
        }
    }

    /// Record a rejected scan in the audit trail and build its response.
    async fn reject(
        &self,
        attempt: &ScanAttempt,
        ticket_id: Option<Uuid>,
        event_id: Option<Uuid>,
        rejection: Rejection,
        remaining: Option<i32>,
    ) -> Result<ScanResponse, sqlx::Error> {
        let outcome = rejection.outcome();
        let record = RejectionRecord {
            ticket_id,
            event_id,
            scanned_by: attempt.scanned_by.clone(),
            scanned_at: attempt.scanned_at,
            outcome: outcome.into(),
            remaining_after: remaining,
            source: attempt.source,
            local_id: attempt.local_id.clone(),
        };

        match self.scans.record_rejection(record).await {
            Ok(scan) => {
                record_scan_outcome(outcome, attempt.scan_source());
                info!(
                    ticket_id = ?ticket_id,
                    outcome = outcome.as_str(),
                    scanned_by = %attempt.scanned_by,
                    "Scan rejected"
                );
                Ok(scan_response(&scan))
            }
            Err(err) if is_unique_violation(&err) => self.previously_recorded(attempt, err).await,
            Err(err) => Err(err),
        }
    }

    /// Lost a replay race on `local_id`: another reconciliation recorded
    /// this scan first. Return what it recorded.
    async fn previously_recorded(
        &self,
        attempt: &ScanAttempt,
        err: sqlx::Error,
    ) -> Result<ScanResponse, sqlx::Error> {
        let Some(local_id) = attempt.local_id.as_deref() else {
            return Err(err);
        };
        match self.scans.find_by_local_id(local_id).await? {
            Some(scan) => Ok(scan_response(&scan)),
            None => Err(err),
        }
    }
}

/// Build the outcome payload from a recorded scan row.
fn scan_response(scan: &ScanEntity) -> ScanResponse {
    let outcome: ScanOutcome = scan.outcome.into();
    ScanResponse {
        accepted: outcome.is_accepted(),
        outcome,
        remaining_count: scan.remaining_after,
        entered_names: if scan.entered_names.is_empty() {
            None
        } else {
            Some(scan.entered_names.clone())
        },
        message: outcome.operator_message().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use persistence::entities::ScanOutcomeDb;

    fn scan_entity(outcome: ScanOutcomeDb, names: Vec<String>, remaining: Option<i32>) -> ScanEntity {
        ScanEntity {
            id: Uuid::new_v4(),
            ticket_id: Some(Uuid::new_v4()),
            event_id: Some(Uuid::new_v4()),
            scanned_by: "gate-1".to_string(),
            scanned_at: Utc.with_ymd_and_hms(2025, 6, 15, 18, 0, 0).unwrap(),
            outcome,
            entry_count: names.len() as i32,
            entered_names: names,
            remaining_after: remaining,
            source: ScanSourceDb::Live,
            local_id: None,
            recorded_at: Utc.with_ymd_and_hms(2025, 6, 15, 18, 0, 1).unwrap(),
        }
    }

    #[test]
    fn test_scan_response_for_admission() {
        let scan = scan_entity(
            ScanOutcomeDb::PartiallyAdmitted,
            vec!["Ada".to_string(), "Grace".to_string()],
            Some(2),
        );
        let response = scan_response(&scan);
        assert!(response.accepted);
        assert_eq!(response.outcome, ScanOutcome::PartiallyAdmitted);
        assert_eq!(response.remaining_count, Some(2));
        assert_eq!(
            response.entered_names,
            Some(vec!["Ada".to_string(), "Grace".to_string()])
        );
    }

    #[test]
    fn test_scan_response_for_rejection() {
        let scan = scan_entity(ScanOutcomeDb::AlreadyFullyAdmitted, vec![], Some(0));
        let response = scan_response(&scan);
        assert!(!response.accepted);
        assert_eq!(response.outcome, ScanOutcome::AlreadyFullyAdmitted);
        assert_eq!(response.entered_names, None);
        assert_eq!(response.message, "all guests already entered");
    }

    #[test]
    fn test_offline_items_sort_by_scan_instant() {
        let base = Utc.with_ymd_and_hms(2025, 6, 15, 18, 0, 0).unwrap();
        let item = |local_id: &str, offset_secs: i64| OfflineScanInput {
            local_id: local_id.to_string(),
            token: "t".to_string(),
            gate_event_id: Uuid::new_v4(),
            scanned_by: "gate-2".to_string(),
            scanned_at: base + chrono::Duration::seconds(offset_secs),
            entry_quantity: None,
            entered_names: None,
        };

        let mut items = vec![item("c", 20), item("a", 0), item("b", 10)];
        items.sort_by_key(|i| i.scanned_at);
        let order: Vec<&str> = items.iter().map(|i| i.local_id.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }
}
