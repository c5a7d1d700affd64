//! Closed error taxonomy for the credential and session lifecycle
//!
//! Provider-native failure identifiers are translated into these variants at
//! the identity gateway boundary; everything above that boundary is
//! provider-agnostic. Transport failures are always `GatewayUnavailable`,
//! never one of the logical rejection kinds.

use sqlx::Error as SqlxError;
use thiserror::Error;

/// Authentication and authorization failure kinds
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    /// Provider rejected the password against its policy
    #[error("Password does not meet the security requirements")]
    InvalidPassword,

    /// The email is already registered
    #[error("An account with this email already exists")]
    AccountExists,

    /// Wrong confirmation code
    #[error("The verification code does not match")]
    CodeMismatch,

    /// Confirmation code past its validity window
    #[error("The verification code has expired")]
    CodeExpired,

    /// No account (or no pending sign-up) for the email
    #[error("No account was found for this email")]
    AccountNotFound,

    /// Provider reported a confirmation that did not terminate in `true`
    #[error("Confirmation did not complete")]
    IncompleteConfirmation,

    /// Resend requested for an account that is already confirmed
    #[error("This account is already confirmed")]
    AlreadyConfirmed,

    /// Provider-side rate limit hit
    #[error("Too many attempts, please wait before trying again")]
    RateLimited,

    /// Refresh exchange returned no authentication result
    #[error("The refresh exchange returned no credentials")]
    RefreshInvalid,

    /// The refresh token itself is no longer honored
    #[error("The session has expired, please sign in again")]
    SessionExpired,

    /// Any provider rejection of an access or ID token
    #[error("The provided token was rejected")]
    TokenInvalid,

    /// Credentials were missing or rejected outright
    #[error("Invalid or missing credentials")]
    Unauthenticated,

    /// Write attempted against a collection outside the allowlist
    #[error("Resource '{0}' is not writable")]
    ResourceNotAllowed(String),

    /// Persistence failed; the underlying cause is attached for diagnostics
    #[error("Failed to persist record: {0}")]
    WriteFailed(String),

    /// Transport-level failure talking to the provider or a peer service
    #[error("Identity provider unavailable: {0}")]
    GatewayUnavailable(String),
}

impl AuthError {
    /// Stable machine-readable code carried in wire error bodies
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidPassword => "invalid_password",
            AuthError::AccountExists => "account_exists",
            AuthError::CodeMismatch => "code_mismatch",
            AuthError::CodeExpired => "code_expired",
            AuthError::AccountNotFound => "account_not_found",
            AuthError::IncompleteConfirmation => "incomplete_confirmation",
            AuthError::AlreadyConfirmed => "already_confirmed",
            AuthError::RateLimited => "rate_limited",
            AuthError::RefreshInvalid => "refresh_invalid",
            AuthError::SessionExpired => "session_expired",
            AuthError::TokenInvalid => "token_invalid",
            AuthError::Unauthenticated => "unauthenticated",
            AuthError::ResourceNotAllowed(_) => "resource_not_allowed",
            AuthError::WriteFailed(_) => "write_failed",
            AuthError::GatewayUnavailable(_) => "gateway_unavailable",
        }
    }

    /// Rebuild a taxonomy variant from a wire code and its message
    ///
    /// Used by HTTP clients of the gateways to recover the variant a peer
    /// service reported. Unknown codes collapse to `GatewayUnavailable`
    /// because a body we cannot interpret is a broken transport contract.
    pub fn from_code(code: &str, message: &str) -> Self {
        match code {
            "invalid_password" => AuthError::InvalidPassword,
            "account_exists" => AuthError::AccountExists,
            "code_mismatch" => AuthError::CodeMismatch,
            "code_expired" => AuthError::CodeExpired,
            "account_not_found" => AuthError::AccountNotFound,
            "incomplete_confirmation" => AuthError::IncompleteConfirmation,
            "already_confirmed" => AuthError::AlreadyConfirmed,
            "rate_limited" => AuthError::RateLimited,
            "refresh_invalid" => AuthError::RefreshInvalid,
            "session_expired" => AuthError::SessionExpired,
            "token_invalid" => AuthError::TokenInvalid,
            "unauthenticated" => AuthError::Unauthenticated,
            "resource_not_allowed" => AuthError::ResourceNotAllowed(message.to_string()),
            "write_failed" => AuthError::WriteFailed(message.to_string()),
            "gateway_unavailable" => AuthError::GatewayUnavailable(message.to_string()),
            other => AuthError::GatewayUnavailable(format!("unknown error code '{other}'")),
        }
    }

    /// True for failures that must be logged as security events with the
    /// acting identity, as opposed to ordinary user-facing failures.
    pub fn is_security_event(&self) -> bool {
        matches!(
            self,
            AuthError::TokenInvalid | AuthError::ResourceNotAllowed(_)
        )
    }
}

/// Custom error type for database operations
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred during database connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during database query execution
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;
