//! Local profile records and the dual-source existence check

use common::error::AuthError;
use regex::Regex;
use sqlx::{PgPool, Row};
use std::sync::OnceLock;

/// Validate email shape before touching any backing store
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email must be at most 254 characters long".to_string());
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if !regex.is_match(email) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

/// Check the local profile table for an account with this email
pub async fn email_in_profiles(pool: &PgPool, email: &str) -> Result<bool, AuthError> {
    let row = sqlx::query(
        r#"
        SELECT EXISTS(SELECT 1 FROM profiles WHERE email = $1) AS present
        "#,
    )
    .bind(email)
    .fetch_one(pool)
    .await
    .map_err(|e| AuthError::GatewayUnavailable(format!("profile lookup failed: {e}")))?;

    Ok(row.get("present"))
}

/// Merge the two existence sources into the single boolean answer
///
/// "Exists in either" is the whole contract. The result intentionally does
/// not say which source matched, so the endpoint cannot be used to
/// fingerprint where an account lives.
pub fn merge_existence(in_profiles: bool, in_provider: bool) -> bool {
    in_profiles || in_provider
}
