//! Scan repository: audit-trail writes and idempotency lookups.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::{ScanEntity, ScanOutcomeDb, ScanSourceDb};
use crate::metrics::QueryTimer;

/// A rejected scan attempt to be recorded in the audit trail.
///
/// `ticket_id`/`event_id` hold the token's claims when they could be
/// decoded; a forged token is recorded without them.
#[derive(Debug, Clone)]
pub struct RejectionRecord {
    pub ticket_id: Option<Uuid>,
    pub event_id: Option<Uuid>,
    pub scanned_by: String,
    pub scanned_at: DateTime<Utc>,
    pub outcome: ScanOutcomeDb,
    /// Remaining count observed at rejection time, when known.
    pub remaining_after: Option<i32>,
    pub source: ScanSourceDb,
    pub local_id: Option<String>,
}

/// Repository for scan-record database operations.
#[derive(Clone)]
pub struct ScanRepository {
    pool: PgPool,
}

impl ScanRepository {
    /// Creates a new ScanRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Find a previously recorded scan by its client-generated local ID.
    ///
    /// Used by offline reconciliation to make batch replay idempotent.
    pub async fn find_by_local_id(
        &self,
        local_id: &str,
    ) -> Result<Option<ScanEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_scan_by_local_id");
        let result = sqlx::query_as::<_, ScanEntity>(
            r#"
            SELECT id, ticket_id, event_id, scanned_by, scanned_at, outcome,
                   entry_count, entered_names, remaining_after, source, local_id, recorded_at
            FROM scans
            WHERE local_id = $1
            "#,
        )
        .bind(local_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Record a rejected scan attempt. The audit trail keeps every resolved
    /// scan, not only admissions.
    pub async fn record_rejection(
        &self,
        record: RejectionRecord,
    ) -> Result<ScanEntity, sqlx::Error> {
        let timer = QueryTimer::new("record_scan_rejection");
        let result = sqlx::query_as::<_, ScanEntity>(
            r#"
            INSERT INTO scans
                (ticket_id, event_id, scanned_by, scanned_at, outcome,
                 entry_count, entered_names, remaining_after, source, local_id)
            VALUES ($1, $2, $3, $4, $5, 0, '{}', $6, $7, $8)
            RETURNING id, ticket_id, event_id, scanned_by, scanned_at, outcome,
                      entry_count, entered_names, remaining_after, source, local_id, recorded_at
            "#,
        )
        .bind(record.ticket_id)
        .bind(record.event_id)
        .bind(&record.scanned_by)
        .bind(record.scanned_at)
        .bind(record.outcome)
        .bind(record.remaining_after)
        .bind(record.source)
        .bind(&record.local_id)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// List all scans recorded for a ticket, oldest first.
    pub async fn list_for_ticket(&self, ticket_id: Uuid) -> Result<Vec<ScanEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_scans_for_ticket");
        let result = sqlx::query_as::<_, ScanEntity>(
            r#"
            SELECT id, ticket_id, event_id, scanned_by, scanned_at, outcome,
                   entry_count, entered_names, remaining_after, source, local_id, recorded_at
            FROM scans
            WHERE ticket_id = $1
            ORDER BY scanned_at ASC, recorded_at ASC
            "#,
        )
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }
}
