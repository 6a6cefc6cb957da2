//! Admission decision logic.
//!
//! Pure decision rules: given verified token claims and the authoritative
//! ticket snapshot, decide whether and how many people may be admitted. No
//! I/O happens here; the transactional re-check against concurrent scans
//! lives in the persistence layer.

use uuid::Uuid;

use crate::models::scan::Rejection;
use crate::models::ticket::TicketSnapshot;

/// An accepted admission decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    /// People admitted by this scan.
    pub entry_quantity: i32,
    /// Projected remaining count once this admission commits. Advisory: the
    /// transaction re-derives it from the row it locks.
    pub remaining_after: i32,
}

/// Decides acceptance and entry quantity for one scan.
///
/// Rules apply in order, short-circuiting on the first rejection:
/// event match, RSVP confirmation, remaining capacity, quantity bounds.
/// Both the event claimed by the token and the event the gate is admitting
/// for must match the ticket. An omitted `requested_quantity` admits
/// everyone still remaining.
pub fn evaluate(
    ticket: &TicketSnapshot,
    token_event_id: Uuid,
    gate_event_id: Uuid,
    requested_quantity: Option<i32>,
    entered_names: Option<&[String]>,
) -> Result<Admission, Rejection> {
    if ticket.event_id != token_event_id || ticket.event_id != gate_event_id {
        return Err(Rejection::EventMismatch);
    }

    if !ticket.rsvp_confirmed {
        return Err(Rejection::NotConfirmed);
    }

    // Duplicate scan of an exhausted ticket, not an error.
    if ticket.remaining_count == 0 {
        return Err(Rejection::AlreadyFullyAdmitted);
    }

    let entry_quantity = match requested_quantity {
        Some(quantity) if quantity < 1 || quantity > ticket.remaining_count => {
            return Err(Rejection::InvalidQuantity);
        }
        Some(quantity) => quantity,
        None => ticket.remaining_count,
    };

    if let Some(names) = entered_names {
        if names.len() as i32 != entry_quantity {
            return Err(Rejection::InvalidQuantity);
        }
    }

    Ok(Admission {
        entry_quantity,
        remaining_after: ticket.remaining_count - entry_quantity,
    })
}

/// Resolves the individual names recorded for one admission.
///
/// Explicit names from the scanner win. Otherwise the next `entry_quantity`
/// names from the guest's party list are taken, in order, starting after the
/// members already admitted; placeholders fill in when the list is short.
pub fn resolve_entered_names(
    explicit: Option<Vec<String>>,
    party_members: &[String],
    party_size: i32,
    remaining_before: i32,
    entry_quantity: i32,
) -> Vec<String> {
    if let Some(names) = explicit {
        return names;
    }

    let already_admitted = (party_size - remaining_before).max(0) as usize;
    (0..entry_quantity.max(0) as usize)
        .map(|i| {
            party_members
                .get(already_admitted + i)
                .cloned()
                .unwrap_or_else(|| format!("Guest {}", already_admitted + i + 1))
        })
        .collect()
}
