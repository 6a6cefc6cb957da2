//! Redemption token codec.
//!
//! Builds and verifies the compact signed token a scanner reads from a QR
//! code. Tokens are HS256 JWTs signed with a process-wide secret injected at
//! construction, bound to one ticket and valid for the entire calendar day of
//! the event in the venue's reference timezone.
//!
//! A token that passes verification is not yet an admission decision: the
//! embedded counts are advisory snapshots from issuance time, and the caller
//! must still consult live ticket state.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::event_day::{end_of_day_utc, is_same_event_day};

/// Error type for token operations.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Failed to encode token: {0}")]
    Encoding(String),

    #[error("Token signature is invalid or the token is malformed")]
    Forged,

    #[error("Token has expired")]
    Expired { claims: Box<RedemptionClaims> },

    #[error("Token is not valid on this calendar day")]
    OutsideEventWindow { claims: Box<RedemptionClaims> },
}

/// Claims carried by a redemption token.
///
/// `party_size` and `remaining_count` are snapshots taken at issuance; they
/// exist for display and debugging only and are never trusted for the
/// admission decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedemptionClaims {
    /// Subject (ticket ID)
    pub sub: String,
    /// Event the ticket belongs to
    pub event_id: Uuid,
    /// Invitee holding the ticket
    pub guest_id: Uuid,
    /// Party size at issuance (advisory)
    pub party_size: i32,
    /// Remaining count at issuance (advisory)
    pub remaining_count: i32,
    /// Calendar date of the event in the reference timezone
    pub occurs_on: NaiveDate,
    /// Expiration time (Unix timestamp, end of the event day)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// JWT ID (unique per issued token)
    pub jti: String,
}

impl RedemptionClaims {
    /// Parses the subject claim back into a ticket ID.
    pub fn ticket_id(&self) -> Result<Uuid, TokenError> {
        Uuid::parse_str(&self.sub).map_err(|_| TokenError::Forged)
    }
}

/// Snapshot of the ticket fields embedded in a token at issuance.
#[derive(Debug, Clone)]
pub struct TicketFacts {
    pub ticket_id: Uuid,
    pub event_id: Uuid,
    pub guest_id: Uuid,
    pub party_size: i32,
    pub remaining_count: i32,
    pub occurs_on: NaiveDate,
}

/// A freshly issued redemption token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub jti: String,
    pub expires_at: DateTime<Utc>,
}

/// Builds and verifies redemption tokens.
///
/// Constructed once at startup from configuration and injected everywhere a
/// token is issued or verified; there is no module-level secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    reference_offset: FixedOffset,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("reference_offset", &self.reference_offset)
            .field("encoding_key", &"[REDACTED]")
            .field("decoding_key", &"[REDACTED]")
            .finish()
    }
}

impl TokenCodec {
    /// Creates a codec from the signing secret and the venue's reference
    /// timezone offset.
    pub fn new(secret: &str, reference_offset: FixedOffset) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            reference_offset,
        }
    }

    /// Issues a token for the given ticket snapshot.
    ///
    /// Expiry is the end of the event's calendar day in the reference
    /// timezone. Read-only: loading the snapshot is the caller's concern.
    pub fn issue(&self, facts: &TicketFacts) -> Result<IssuedToken, TokenError> {
        let now = Utc::now();
        let jti = Uuid::new_v4().to_string();
        let expires_at = end_of_day_utc(facts.occurs_on, self.reference_offset);

        let claims = RedemptionClaims {
            sub: facts.ticket_id.to_string(),
            event_id: facts.event_id,
            guest_id: facts.guest_id,
            party_size: facts.party_size,
            remaining_count: facts.remaining_count,
            occurs_on: facts.occurs_on,
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            jti: jti.clone(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Encoding(e.to_string()))?;

        Ok(IssuedToken {
            token,
            jti,
            expires_at,
        })
    }

    /// Verifies a token against the current wall clock.
    pub fn verify(&self, token: &str) -> Result<RedemptionClaims, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// Verifies a token as of `now`, in order and short-circuiting:
    /// signature integrity, then embedded expiry, then the same-calendar-day
    /// check in the reference timezone.
    ///
    /// Expiry and day-window are checked here rather than by the JWT library
    /// so that the decoded claims stay available for the audit trail even
    /// when the token is rejected.
    pub fn verify_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<RedemptionClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let data = decode::<RedemptionClaims>(token, &self.decoding_key, &validation)
            .map_err(|_| TokenError::Forged)?;
        let claims = data.claims;

        if now.timestamp() > claims.exp {
            return Err(TokenError::Expired {
                claims: Box::new(claims),
            });
        }

        if !is_same_event_day(now, claims.occurs_on, self.reference_offset) {
            return Err(TokenError::OutsideEventWindow {
                claims: Box::new(claims),
            });
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    const TEST_SECRET: &str = "test_secret_key_for_token_testing_12345";

    fn utc_codec() -> TokenCodec {
        TokenCodec::new(TEST_SECRET, FixedOffset::east_opt(0).unwrap())
    }

    fn facts_for(occurs_on: NaiveDate) -> TicketFacts {
        TicketFacts {
            ticket_id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            guest_id: Uuid::new_v4(),
            party_size: 4,
            remaining_count: 4,
            occurs_on,
        }
    }

    fn event_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    fn noon_on_event_day() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_issue_and_verify_round_trip() {
        let codec = utc_codec();
        let facts = facts_for(event_date());

        let issued = codec.issue(&facts).unwrap();
        assert!(issued.token.contains('.'), "JWT should have dot separators");

        let claims = codec.verify_at(&issued.token, noon_on_event_day()).unwrap();
        assert_eq!(claims.ticket_id().unwrap(), facts.ticket_id);
        assert_eq!(claims.event_id, facts.event_id);
        assert_eq!(claims.guest_id, facts.guest_id);
        assert_eq!(claims.party_size, 4);
        assert_eq!(claims.remaining_count, 4);
        assert_eq!(claims.occurs_on, facts.occurs_on);
        assert_eq!(claims.jti, issued.jti);
    }

    #[test]
    fn test_expiry_is_end_of_event_day() {
        let codec = utc_codec();
        let issued = codec.issue(&facts_for(event_date())).unwrap();
        assert_eq!(
            issued.expires_at,
            Utc.with_ymd_and_hms(2025, 6, 15, 23, 59, 59).unwrap()
        );
    }

    #[test]
    fn test_expiry_respects_reference_offset() {
        let codec = TokenCodec::new(TEST_SECRET, FixedOffset::east_opt(-5 * 3600).unwrap());
        let issued = codec.issue(&facts_for(event_date())).unwrap();
        // 23:59:59 at UTC-5 is 04:59:59 UTC the next day.
        assert_eq!(
            issued.expires_at,
            Utc.with_ymd_and_hms(2025, 6, 16, 4, 59, 59).unwrap()
        );
    }

    #[test]
    fn test_tampered_token_is_forged() {
        let codec = utc_codec();
        let issued = codec.issue(&facts_for(event_date())).unwrap();

        // Flip a character in the payload section.
        let mut parts: Vec<String> = issued.token.split('.').map(String::from).collect();
        let mut payload: Vec<char> = parts[1].chars().collect();
        payload[0] = if payload[0] == 'A' { 'B' } else { 'A' };
        parts[1] = payload.into_iter().collect();
        let tampered = parts.join(".");

        let result = codec.verify_at(&tampered, noon_on_event_day());
        assert!(matches!(result, Err(TokenError::Forged)));
    }

    #[test]
    fn test_wrong_secret_is_forged() {
        let codec = utc_codec();
        let other = TokenCodec::new("another_secret_entirely_9876543210", FixedOffset::east_opt(0).unwrap());
        let issued = codec.issue(&facts_for(event_date())).unwrap();

        assert!(matches!(
            other.verify_at(&issued.token, noon_on_event_day()),
            Err(TokenError::Forged)
        ));
    }

    #[test]
    fn test_garbage_token_is_forged() {
        let codec = utc_codec();
        assert!(matches!(
            codec.verify_at("not_a_jwt", noon_on_event_day()),
            Err(TokenError::Forged)
        ));
    }

    #[test]
    fn test_day_after_is_expired() {
        let codec = utc_codec();
        let issued = codec.issue(&facts_for(event_date())).unwrap();

        let next_day = Utc.with_ymd_and_hms(2025, 6, 16, 12, 0, 0).unwrap();
        let result = codec.verify_at(&issued.token, next_day);
        match result {
            Err(TokenError::Expired { claims }) => {
                assert_eq!(claims.occurs_on, event_date());
            }
            other => panic!("Expected Expired, got: {:?}", other),
        }
    }

    #[test]
    fn test_day_before_is_outside_event_window() {
        // Expiry is still in the future the day before; the independent
        // day-match check must reject the scan.
        let codec = utc_codec();
        let issued = codec.issue(&facts_for(event_date())).unwrap();

        let day_before = Utc.with_ymd_and_hms(2025, 6, 14, 12, 0, 0).unwrap();
        let result = codec.verify_at(&issued.token, day_before);
        assert!(matches!(result, Err(TokenError::OutsideEventWindow { .. })));
    }

    #[test]
    fn test_valid_until_last_second_of_day() {
        let codec = utc_codec();
        let issued = codec.issue(&facts_for(event_date())).unwrap();

        let last_second = Utc.with_ymd_and_hms(2025, 6, 15, 23, 59, 59).unwrap();
        assert!(codec.verify_at(&issued.token, last_second).is_ok());

        let just_after = Utc.with_ymd_and_hms(2025, 6, 16, 0, 0, 0).unwrap();
        assert!(codec.verify_at(&issued.token, just_after).is_err());
    }

    #[test]
    fn test_unique_jti_per_token() {
        let codec = utc_codec();
        let facts = facts_for(event_date());

        let first = codec.issue(&facts).unwrap();
        let second = codec.issue(&facts).unwrap();
        assert_ne!(first.jti, second.jti, "Each token should have unique jti");
    }

    #[test]
    fn test_debug_redacts_keys() {
        let rendered = format!("{:?}", utc_codec());
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains(TEST_SECRET));
    }

    #[test]
    fn test_token_error_display() {
        assert!(format!("{}", TokenError::Forged).contains("invalid"));
        assert!(format!("{}", TokenError::Encoding("boom".into())).contains("encode"));
    }
}
