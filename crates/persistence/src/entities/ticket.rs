//! Ticket entities (database row mappings).

use chrono::NaiveDate;
use sqlx::FromRow;
use uuid::Uuid;

use domain::models::ticket::TicketSnapshot;

/// Ticket joined with its event and guest, as read by the admission pipeline.
#[derive(Debug, Clone, FromRow)]
pub struct TicketWithContextEntity {
    pub id: Uuid,
    pub event_id: Uuid,
    pub guest_id: Uuid,
    pub party_size: i32,
    pub remaining_count: i32,
    // Event info
    pub occurs_on: NaiveDate,
    pub event_status: String,
    // Guest info
    pub guest_name: String,
    pub party_members: Vec<String>,
    pub rsvp_confirmed: bool,
}

impl TicketWithContextEntity {
    /// The validator's view of this row.
    pub fn snapshot(&self) -> TicketSnapshot {
        TicketSnapshot {
            ticket_id: self.id,
            event_id: self.event_id,
            guest_id: self.guest_id,
            party_size: self.party_size,
            remaining_count: self.remaining_count,
            rsvp_confirmed: self.rsvp_confirmed,
            occurs_on: self.occurs_on,
        }
    }
}
