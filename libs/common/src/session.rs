//! Session model and validity rules
//!
//! A session is the whole token triple plus its expiry. It is only ever
//! replaced as a unit: there are no partial field updates anywhere in the
//! system, so a mismatched access/ID/refresh combination can never exist
//! transiently.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// An issued session: access/ID/refresh tokens plus derived expiry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub id_token: String,
    pub refresh_token: String,
    /// Issuance time plus the provider-reported lifetime
    pub expires_at: DateTime<Utc>,
    pub token_type: String,
}

impl Session {
    /// Build a session from a provider issuance
    ///
    /// `expires_at` is always derived from `issued_at` plus the lifetime the
    /// provider reported; callers never set it directly.
    pub fn issued(
        access_token: String,
        id_token: String,
        refresh_token: String,
        issued_at: DateTime<Utc>,
        expires_in_seconds: i64,
        token_type: String,
    ) -> Self {
        Self {
            access_token,
            id_token,
            refresh_token,
            expires_at: issued_at + Duration::seconds(expires_in_seconds),
            token_type,
        }
    }

    /// A session is valid iff every token field is present and it has not
    /// passed its expiry. Holding an invalid session is not an error; it is
    /// the signal to attempt a refresh before any authenticated call.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty()
            && !self.id_token.is_empty()
            && !self.refresh_token.is_empty()
            && !self.token_type.is_empty()
            && now < self.expires_at
    }
}
