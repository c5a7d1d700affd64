//! Identity gateway abstraction and its HTTP implementation
//!
//! The flow controller talks to the identity service through the
//! [`IdentityGateway`] trait so the whole registration/sign-in flow can be
//! exercised against a mock in tests. `HttpIdentityGateway` is the production
//! implementation and also the only place where wire errors are turned back
//! into the closed `AuthError` taxonomy.

use chrono::Utc;
use common::{error::AuthError, session::Session};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

/// Attributes collected during sign-up and forwarded to the provider
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignUpAttributes {
    pub first_name: String,
    pub last_name: String,
}

/// Result of initiating a sign-up
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SignUpOutcome {
    pub user_id: String,
    pub confirmed: bool,
}

/// Result of a sign-in attempt
///
/// `needs_verification` means the credentials were accepted but the account
/// is unconfirmed; no session is issued in that case.
#[derive(Debug, Clone, PartialEq)]
pub struct SignInOutcome {
    pub user_id: String,
    pub session: Option<Session>,
    pub needs_verification: bool,
}

/// Where the confirmation code was delivered
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResendReceipt {
    pub delivery_channel: String,
    pub destination: String,
}

/// Capability contract of the identity service, as seen by the client
#[allow(async_fn_in_trait)]
pub trait IdentityGateway {
    async fn sign_in(&self, email: &str, password: &str) -> Result<SignInOutcome, AuthError>;

    async fn initiate_sign_up(
        &self,
        email: &str,
        password: &str,
        attrs: &SignUpAttributes,
    ) -> Result<SignUpOutcome, AuthError>;

    async fn confirm_sign_up(&self, email: &str, code: &str) -> Result<(), AuthError>;

    async fn resend_confirmation(&self, email: &str) -> Result<ResendReceipt, AuthError>;

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, AuthError>;

    async fn account_exists(&self, email: &str) -> Result<bool, AuthError>;

    async fn request_password_reset(&self, email: &str) -> Result<(), AuthError>;

    async fn confirm_password_reset(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), AuthError>;
}

/// Wire error body shared by the backend services
#[derive(Debug, Deserialize)]
struct WireError {
    error: String,
    #[serde(default)]
    message: String,
}

/// Session as serialized by the identity service
///
/// The expiry comes across as a lifetime; the absolute `expires_at` is
/// derived client-side from the moment the response is applied.
#[derive(Debug, Deserialize)]
struct WireSession {
    access_token: String,
    id_token: String,
    refresh_token: String,
    expires_in: i64,
    token_type: String,
}

impl WireSession {
    fn into_session(self) -> Session {
        Session::issued(
            self.access_token,
            self.id_token,
            self.refresh_token,
            Utc::now(),
            self.expires_in,
            self.token_type,
        )
    }
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    user_id: String,
    needs_verification: bool,
    session: Option<WireSession>,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    session: WireSession,
}

#[derive(Debug, Deserialize)]
struct ResendResponse {
    code_delivery_details: ResendReceipt,
}

#[derive(Debug, Deserialize)]
struct ExistsResponse {
    exists: bool,
}

/// HTTP gateway against the identity service
#[derive(Debug, Clone)]
pub struct HttpIdentityGateway {
    base_url: String,
    http: reqwest::Client,
}

impl HttpIdentityGateway {
    /// Create a gateway for the identity service at `base_url`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::Client::new(),
        }
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, AuthError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| AuthError::GatewayUnavailable(e.to_string()))?;

        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, AuthError> {
        if response.status().is_success() {
            response
                .json()
                .await
                .map_err(|e| AuthError::GatewayUnavailable(format!("malformed response: {e}")))
        } else {
            let wire: WireError = response
                .json()
                .await
                .map_err(|e| AuthError::GatewayUnavailable(format!("malformed error body: {e}")))?;
            Err(AuthError::from_code(&wire.error, &wire.message))
        }
    }
}

impl IdentityGateway for HttpIdentityGateway {
    async fn sign_in(&self, email: &str, password: &str) -> Result<SignInOutcome, AuthError> {
        let response: LoginResponse = self
            .post_json(
                "/auth/login",
                &serde_json::json!({ "email": email, "password": password }),
            )
            .await?;

        Ok(SignInOutcome {
            user_id: response.user_id,
            needs_verification: response.needs_verification,
            session: response.session.map(WireSession::into_session),
        })
    }

    async fn initiate_sign_up(
        &self,
        email: &str,
        password: &str,
        attrs: &SignUpAttributes,
    ) -> Result<SignUpOutcome, AuthError> {
        self.post_json(
            "/auth/signup",
            &serde_json::json!({
                "email": email,
                "password": password,
                "first_name": attrs.first_name,
                "last_name": attrs.last_name,
            }),
        )
        .await
    }

    async fn confirm_sign_up(&self, email: &str, code: &str) -> Result<(), AuthError> {
        let url = format!("{}/auth/confirm", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("email", email), ("code", code)])
            .send()
            .await
            .map_err(|e| AuthError::GatewayUnavailable(e.to_string()))?;

        // Success is an HTML confirmation page when called from a browser;
        // the app only cares that the call terminated successfully.
        if response.status().is_success() {
            Ok(())
        } else {
            let wire: WireError = response
                .json()
                .await
                .map_err(|e| AuthError::GatewayUnavailable(format!("malformed error body: {e}")))?;
            Err(AuthError::from_code(&wire.error, &wire.message))
        }
    }

    async fn resend_confirmation(&self, email: &str) -> Result<ResendReceipt, AuthError> {
        let response: ResendResponse = self
            .post_json("/auth/resend", &serde_json::json!({ "email": email }))
            .await?;
        Ok(response.code_delivery_details)
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, AuthError> {
        let response: RefreshResponse = self
            .post_json(
                "/auth/refresh",
                &serde_json::json!({ "refresh_token": refresh_token }),
            )
            .await?;
        Ok(response.session.into_session())
    }

    async fn account_exists(&self, email: &str) -> Result<bool, AuthError> {
        let response: ExistsResponse = self
            .post_json("/auth/exists", &serde_json::json!({ "email": email }))
            .await?;
        Ok(response.exists)
    }

    async fn request_password_reset(&self, email: &str) -> Result<(), AuthError> {
        let _: serde_json::Value = self
            .post_json("/auth/forgot", &serde_json::json!({ "email": email }))
            .await?;
        Ok(())
    }

    async fn confirm_password_reset(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let _: serde_json::Value = self
            .post_json(
                "/auth/reset",
                &serde_json::json!({ "email": email, "code": code, "password": new_password }),
            )
            .await?;
        Ok(())
    }
}
