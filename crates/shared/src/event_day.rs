//! Event-day arithmetic in the venue's reference timezone.
//!
//! An event ticket is valid for the entire calendar day of the event's date
//! in a fixed reference timezone, regardless of the scanner's local clock.
//! All helpers take the reference offset explicitly so the same code serves
//! every deployment region.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};

/// Returns the last second of `date` in the reference timezone, as a UTC instant.
///
/// This is the expiry embedded in redemption tokens: a token issued for an
/// event stays redeemable until the event's day ends at the venue.
pub fn end_of_day_utc(date: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    let local_end = date.and_time(NaiveTime::MIN) + Duration::days(1) - Duration::seconds(1);
    let naive_utc = local_end - Duration::seconds(i64::from(offset.local_minus_utc()));
    DateTime::from_naive_utc_and_offset(naive_utc, Utc)
}

/// Returns the calendar date of `at` as observed in the reference timezone.
pub fn local_date(at: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    at.with_timezone(&offset).date_naive()
}

/// Whether `at` falls on the event's calendar day in the reference timezone.
///
/// Checked independently of token expiry: expiry alone would admit entry
/// before the event day when a token was issued far in advance.
pub fn is_same_event_day(at: DateTime<Utc>, occurs_on: NaiveDate, offset: FixedOffset) -> bool {
    local_date(at, offset) == occurs_on
}
