//! Ticket endpoint handlers: token issuance and the operator status view.

use axum::{
    extract::{Path, State},
    Json,
};
use tracing::info;
use uuid::Uuid;

use domain::models::ticket::{IssueTokenResponse, ScanHistoryItem, TicketStatusResponse};
use persistence::repositories::{ScanRepository, TicketRepository};
use shared::token::TicketFacts;

use crate::app::AppState;
use crate::error::ApiError;

/// Issue a redemption token for a ticket.
///
/// POST /api/v1/tickets/:ticket_id/token
///
/// Read-only: issuing does not mutate the ticket. The embedded counts are a
/// snapshot for display; validation re-reads live state at scan time.
pub async fn issue_token(
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
) -> Result<Json<IssueTokenResponse>, ApiError> {
    let ticket_repo = TicketRepository::new(state.pool.clone());

    let context = ticket_repo
        .find_with_context(ticket_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Ticket not found".to_string()))?;

    let snapshot = context.snapshot();
    let issued = state
        .codec
        .issue(&TicketFacts::from(&snapshot))
        .map_err(|e| ApiError::Internal(format!("Failed to issue token: {}", e)))?;

    info!(
        ticket_id = %ticket_id,
        event_id = %snapshot.event_id,
        jti = %issued.jti,
        expires_at = %issued.expires_at,
        "Redemption token issued"
    );

    Ok(Json(IssueTokenResponse {
        ticket_id,
        event_id: snapshot.event_id,
        token: issued.token,
        expires_at: issued.expires_at,
        party_size: snapshot.party_size,
        remaining_count: snapshot.remaining_count,
    }))
}

/// Operator-facing ticket status with its scan history.
///
/// GET /api/v1/tickets/:ticket_id
pub async fn get_ticket(
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
) -> Result<Json<TicketStatusResponse>, ApiError> {
    let ticket_repo = TicketRepository::new(state.pool.clone());
    let scan_repo = ScanRepository::new(state.pool.clone());

    let context = ticket_repo
        .find_with_context(ticket_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Ticket not found".to_string()))?;

    let scans = scan_repo.list_for_ticket(ticket_id).await?;
    let history: Vec<ScanHistoryItem> = scans
        .into_iter()
        .map(|s| ScanHistoryItem {
            scan_id: s.id,
            scanned_by: s.scanned_by,
            scanned_at: s.scanned_at,
            outcome: s.outcome.into(),
            entry_count: s.entry_count,
            entered_names: s.entered_names,
            source: s.source.into(),
        })
        .collect();

    let snapshot = context.snapshot();

    Ok(Json(TicketStatusResponse {
        ticket_id,
        event_id: snapshot.event_id,
        guest_id: snapshot.guest_id,
        guest_name: context.guest_name,
        party_size: snapshot.party_size,
        remaining_count: snapshot.remaining_count,
        state: snapshot.state(),
        rsvp_confirmed: snapshot.rsvp_confirmed,
        occurs_on: snapshot.occurs_on,
        scans: history,
    }))
}
