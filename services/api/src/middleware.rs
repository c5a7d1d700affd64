//! Bearer-token authentication middleware
//!
//! Every request entering a protected route passes through here exactly once.
//! The token is re-validated against the identity service per request; there
//! is no local token cache and no locally-decoded claims.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use common::error::AuthError;
use tracing::warn;

use crate::{AppState, error::ApiError};

/// Authenticate the request and attach the caller's identity
///
/// Missing or malformed Authorization headers never reach the identity
/// service; they fail locally as unauthenticated.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(&request).ok_or(AuthError::Unauthenticated)?;

    let ctx = state.verifier.authorize(token).await.inspect_err(|e| {
        if e.is_security_event() {
            warn!(error = %e.code(), "rejected bearer token");
        }
    })?;

    request.extensions_mut().insert(ctx);
    Ok(next.run(request).await)
}

/// Extract the bearer token from the Authorization header
fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_with_header(value: Option<&str>) -> Request {
        let mut builder = axum::http::Request::builder().uri("/data/write");
        if let Some(value) = value {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_bearer_token_extracted() {
        let request = request_with_header(Some("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&request), Some("abc.def.ghi"));
    }

    #[test]
    fn test_missing_header_yields_none() {
        let request = request_with_header(None);
        assert_eq!(bearer_token(&request), None);
    }

    #[test]
    fn test_malformed_header_yields_none() {
        assert_eq!(bearer_token(&request_with_header(Some("abc.def.ghi"))), None);
        assert_eq!(bearer_token(&request_with_header(Some("Basic abc"))), None);
        assert_eq!(bearer_token(&request_with_header(Some("Bearer "))), None);
    }
}
