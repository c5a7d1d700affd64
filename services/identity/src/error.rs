//! HTTP error mapping for the identity service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::error::AuthError;
use serde_json::json;
use thiserror::Error;

/// Error type returned by identity service handlers
#[derive(Error, Debug)]
pub enum IdentityError {
    /// Credential/session failure from the taxonomy
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Bad request with message
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Map a taxonomy kind to its HTTP status
pub fn status_for(error: &AuthError) -> StatusCode {
    match error {
        AuthError::TokenInvalid | AuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
        AuthError::ResourceNotAllowed(_) => StatusCode::FORBIDDEN,
        AuthError::WriteFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        AuthError::GatewayUnavailable(_) => StatusCode::BAD_GATEWAY,
        // Logical provider rejections are client errors.
        _ => StatusCode::BAD_REQUEST,
    }
}

impl IntoResponse for IdentityError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            IdentityError::Auth(e) => (status_for(&e), e.code(), e.to_string()),
            IdentityError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
        };

        let body = Json(json!({
            "error": code,
            "message": message,
        }));

        (status, body).into_response()
    }
}
