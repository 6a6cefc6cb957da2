//! Ticket repository: authoritative reads and the atomic admission transaction.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::debug;
use uuid::Uuid;

use domain::services::admission::resolve_entered_names;

use crate::entities::{ScanEntity, ScanOutcomeDb, ScanSourceDb, TicketWithContextEntity};
use crate::metrics::QueryTimer;

/// Input for one admission attempt applied by [`TicketRepository::admit`].
#[derive(Debug, Clone)]
pub struct AdmitInput {
    pub ticket_id: Uuid,
    pub entry_quantity: i32,
    /// Explicit names from the scanner; resolved from the guest's party list
    /// when absent.
    pub entered_names: Option<Vec<String>>,
    pub scanned_by: String,
    pub scanned_at: DateTime<Utc>,
    pub source: ScanSourceDb,
    /// Idempotency key for offline-replayed scans.
    pub local_id: Option<String>,
}

/// Result of the atomic admission transaction.
#[derive(Debug, Clone)]
pub enum AdmitOutcome {
    /// Capacity was available; the ticket was decremented and the scan
    /// recorded, atomically.
    Admitted {
        scan: ScanEntity,
        remaining_after: i32,
    },
    /// A concurrent admission consumed the capacity first. Nothing was
    /// mutated; the caller decides between conflict and duplicate.
    InsufficientRemaining { remaining: i32 },
    /// The ticket row vanished between validation and the transaction.
    TicketMissing,
}

/// Row re-read under lock inside the admission transaction.
#[derive(Debug, FromRow)]
struct LockedTicketRow {
    event_id: Uuid,
    party_size: i32,
    remaining_count: i32,
    party_members: Vec<String>,
}

/// Repository for ticket reads and admissions.
#[derive(Clone)]
pub struct TicketRepository {
    pool: PgPool,
}

impl TicketRepository {
    /// Creates a new TicketRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Load a ticket with its event and guest context.
    ///
    /// This read is a non-authoritative snapshot: the admission transaction
    /// re-reads the counters under lock before mutating anything.
    pub async fn find_with_context(
        &self,
        ticket_id: Uuid,
    ) -> Result<Option<TicketWithContextEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_ticket_with_context");
        let result = sqlx::query_as::<_, TicketWithContextEntity>(
            r#"
            SELECT
                t.id, t.event_id, t.guest_id, t.party_size, t.remaining_count,
                e.occurs_on, e.status AS event_status,
                g.full_name AS guest_name, g.party_members, g.rsvp_confirmed
            FROM tickets t
            JOIN events e ON t.event_id = e.id
            JOIN guests g ON t.guest_id = g.id
            WHERE t.id = $1
            "#,
        )
        .bind(ticket_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Atomically admit `entry_quantity` people on a ticket and record the
    /// scan.
    ///
    /// The ticket row is re-read under a row lock inside the transaction,
    /// closing the gap between the validator's read and this write; the
    /// decrement and the scan insert commit together or not at all. Returns
    /// [`AdmitOutcome::InsufficientRemaining`] without mutating when a
    /// concurrent admission won the race; the caller re-runs the
    /// validate-then-admit cycle rather than retrying here.
    pub async fn admit(&self, input: AdmitInput) -> Result<AdmitOutcome, sqlx::Error> {
        let timer = QueryTimer::new("admit_ticket");
        let result = self.admit_in_tx(input).await;
        timer.record();
        result
    }

    async fn admit_in_tx(&self, input: AdmitInput) -> Result<AdmitOutcome, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        // Lock only the ticket row; admissions on other tickets proceed in
        // parallel.
        let row = sqlx::query_as::<_, LockedTicketRow>(
            r#"
            SELECT t.event_id, t.party_size, t.remaining_count, g.party_members
            FROM tickets t
            JOIN guests g ON t.guest_id = g.id
            WHERE t.id = $1
            FOR UPDATE OF t
            "#,
        )
        .bind(input.ticket_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(AdmitOutcome::TicketMissing);
        };

        if input.entry_quantity > row.remaining_count {
            debug!(
                ticket_id = %input.ticket_id,
                requested = input.entry_quantity,
                remaining = row.remaining_count,
                "Admission lost the capacity race; rolling back"
            );
            tx.rollback().await?;
            return Ok(AdmitOutcome::InsufficientRemaining {
                remaining: row.remaining_count,
            });
        }

        let remaining_after = row.remaining_count - input.entry_quantity;

        sqlx::query(
            r#"
            UPDATE tickets
            SET remaining_count = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(input.ticket_id)
        .bind(remaining_after)
        .execute(&mut *tx)
        .await?;

        let entered_names = resolve_entered_names(
            input.entered_names,
            &row.party_members,
            row.party_size,
            row.remaining_count,
            input.entry_quantity,
        );

        let outcome = if remaining_after == 0 {
            ScanOutcomeDb::FullyAdmitted
        } else {
            ScanOutcomeDb::PartiallyAdmitted
        };

        let scan = sqlx::query_as::<_, ScanEntity>(
            r#"
            INSERT INTO scans
                (ticket_id, event_id, scanned_by, scanned_at, outcome,
                 entry_count, entered_names, remaining_after, source, local_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id, ticket_id, event_id, scanned_by, scanned_at, outcome,
                      entry_count, entered_names, remaining_after, source, local_id, recorded_at
            "#,
        )
        .bind(input.ticket_id)
        .bind(row.event_id)
        .bind(&input.scanned_by)
        .bind(input.scanned_at)
        .bind(outcome)
        .bind(input.entry_quantity)
        .bind(&entered_names)
        .bind(remaining_after)
        .bind(input.source)
        .bind(&input.local_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(AdmitOutcome::Admitted {
            scan,
            remaining_after,
        })
    }
}

#[cfg(test)]
mod tests {
    // Note: TicketRepository tests require a database connection and are
    // covered by integration tests in the api crate.
}
