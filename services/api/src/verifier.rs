//! Server-side token verification against the identity service
//!
//! The access gateway never inspects bearer tokens locally and never trusts
//! a client-asserted identity: every inbound token is re-validated through
//! the identity service, which in turn asks the provider. Access and ID
//! tokens are interchangeable here; whichever was presented is forwarded.

use anyhow::Result;
use common::error::AuthError;
use serde::Deserialize;

/// Identity derived from a successfully-validated bearer token
///
/// Constructed fresh per inbound request inside the auth middleware and
/// never cached across requests.
#[derive(Debug, Clone)]
pub struct AuthorizationContext {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
struct CurrentUserResponse {
    username: String,
}

#[derive(Debug, Deserialize)]
struct WireError {
    error: String,
    #[serde(default)]
    message: String,
}

/// Client for the identity service's current-user operation
#[derive(Debug, Clone)]
pub struct IdentityVerifier {
    http: reqwest::Client,
    base_url: String,
}

impl IdentityVerifier {
    /// Create a verifier for the identity service at `base_url`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Create a verifier from environment variables
    ///
    /// # Environment Variables
    /// - `IDENTITY_URL`: base URL of the identity service (default:
    ///   "http://localhost:3000")
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("IDENTITY_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());
        Ok(Self::new(base_url))
    }

    /// Validate a bearer token and derive the caller's identity
    pub async fn authorize(&self, token: &str) -> Result<AuthorizationContext, AuthError> {
        let url = format!("{}/auth/user", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "access_token": token }))
            .send()
            .await
            .map_err(|e| AuthError::GatewayUnavailable(e.to_string()))?;

        decode_authorization(response).await
    }
}

/// Interpret the identity service's reply
///
/// A parseable rejection keeps its reported kind. A body that cannot be
/// parsed at all is a broken transport contract, never a verdict about the
/// token itself.
async fn decode_authorization(
    response: reqwest::Response,
) -> Result<AuthorizationContext, AuthError> {
    if response.status().is_success() {
        let user: CurrentUserResponse = response.json().await.map_err(|e| {
            AuthError::GatewayUnavailable(format!("malformed identity response: {e}"))
        })?;
        return Ok(AuthorizationContext {
            user_id: user.username,
        });
    }

    match response.json::<WireError>().await {
        Ok(wire) => Err(AuthError::from_code(&wire.error, &wire.message)),
        Err(e) => Err(AuthError::GatewayUnavailable(format!(
            "malformed identity error body: {e}"
        ))),
    }
}
