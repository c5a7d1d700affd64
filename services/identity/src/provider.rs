//! Identity provider client
//!
//! Thin but precisely-specified adapter over the external identity provider.
//! Every operation translates the provider's native `*Exception` identifiers
//! into the closed `AuthError` taxonomy at this boundary; nothing above it
//! sees a provider-specific name. Transport failures (connection errors,
//! malformed bodies, missing expected fields) are always
//! `GatewayUnavailable`, kept distinct from logical rejections.

use anyhow::Result;
use common::error::AuthError;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use tracing::warn;

/// Identity provider configuration
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Base URL of the provider API
    pub base_url: String,
    /// App client identifier registered with the provider
    pub client_id: String,
}

impl ProviderConfig {
    /// Create a new ProviderConfig from environment variables
    ///
    /// # Environment Variables
    /// - `SERENO_IDP_URL`: base URL of the identity provider API
    /// - `SERENO_IDP_CLIENT_ID`: app client id registered with the provider
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("SERENO_IDP_URL")
            .map_err(|_| anyhow::anyhow!("SERENO_IDP_URL environment variable not set"))?;
        let client_id = std::env::var("SERENO_IDP_CLIENT_ID")
            .map_err(|_| anyhow::anyhow!("SERENO_IDP_CLIENT_ID environment variable not set"))?;

        Ok(ProviderConfig {
            base_url,
            client_id,
        })
    }
}

/// Tokens issued by the provider, as relayed to callers
///
/// The expiry travels as a lifetime in seconds; absolute expiry is derived
/// by whoever applies the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuedSession {
    pub access_token: String,
    pub id_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub token_type: String,
}

/// Result of initiating a sign-up with the provider
#[derive(Debug, Clone)]
pub struct ProviderSignUp {
    pub user_id: String,
    pub confirmed: bool,
}

/// Result of a password sign-in with the provider
#[derive(Debug, Clone)]
pub struct ProviderSignIn {
    pub user_id: String,
    pub session: Option<IssuedSession>,
    pub needs_verification: bool,
}

/// Where the provider delivered a confirmation code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeDelivery {
    pub delivery_channel: String,
    pub destination: String,
}

/// Identity resolved from an access or ID token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderUser {
    pub username: String,
    pub attributes: serde_json::Value,
}

/// Provider error body: a native exception identifier plus a message
#[derive(Debug, Deserialize)]
struct ProviderError {
    #[serde(rename = "__type")]
    kind: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct AuthenticationResult {
    access_token: String,
    id_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: i64,
    token_type: String,
}

#[derive(Debug, Deserialize)]
struct SignUpResponse {
    user_sub: String,
    user_confirmed: bool,
}

#[derive(Debug, Deserialize)]
struct ConfirmResponse {
    complete: bool,
}

#[derive(Debug, Deserialize)]
struct ResendResponse {
    code_delivery_details: CodeDeliveryDetails,
}

#[derive(Debug, Deserialize)]
struct CodeDeliveryDetails {
    delivery_medium: String,
    destination: String,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    user_id: String,
    #[serde(default)]
    authentication_result: Option<AuthenticationResult>,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    #[serde(default)]
    authentication_result: Option<AuthenticationResult>,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    exists: bool,
}

/// HTTP client for the identity provider
#[derive(Debug, Clone)]
pub struct ProviderClient {
    http: reqwest::Client,
    config: ProviderConfig,
}

impl ProviderClient {
    /// Create a new provider client
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Initiate a sign-up with the provider
    pub async fn initiate_sign_up(
        &self,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<ProviderSignUp, AuthError> {
        let response: SignUpResponse = self
            .call(
                "/signup",
                &serde_json::json!({
                    "client_id": self.config.client_id,
                    "email": email,
                    "password": password,
                    "attributes": { "given_name": first_name, "family_name": last_name },
                }),
                map_sign_up_error,
            )
            .await?;

        Ok(ProviderSignUp {
            user_id: response.user_sub,
            confirmed: response.user_confirmed,
        })
    }

    /// Confirm a sign-up with the emailed code
    ///
    /// A reply whose `complete` flag is not `true` is the error
    /// `IncompleteConfirmation`, never a success.
    pub async fn confirm_sign_up(&self, email: &str, code: &str) -> Result<(), AuthError> {
        let response: ConfirmResponse = self
            .call(
                "/confirm",
                &serde_json::json!({
                    "client_id": self.config.client_id,
                    "email": email,
                    "code": code,
                }),
                map_confirm_error,
            )
            .await?;

        confirmation_outcome(response)
    }

    /// Ask the provider to resend the confirmation code
    pub async fn resend_confirmation(&self, email: &str) -> Result<CodeDelivery, AuthError> {
        let response: ResendResponse = self
            .call(
                "/resend",
                &serde_json::json!({
                    "client_id": self.config.client_id,
                    "email": email,
                }),
                map_resend_error,
            )
            .await?;

        Ok(CodeDelivery {
            delivery_channel: response.code_delivery_details.delivery_medium,
            destination: response.code_delivery_details.destination,
        })
    }

    /// Password sign-in
    ///
    /// An unconfirmed account is not a failure: the provider reports it as
    /// such and the caller is told to run verification first.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<ProviderSignIn, AuthError> {
        let body = serde_json::json!({
            "client_id": self.config.client_id,
            "email": email,
            "password": password,
        });

        let response = self.send("/login", &body).await?;
        let status = response.status();
        if status.is_success() {
            let login: LoginResponse = decode_body(response).await?;
            let session = login
                .authentication_result
                .map(session_from_login)
                .transpose()?;
            return Ok(ProviderSignIn {
                user_id: login.user_id,
                session,
                needs_verification: false,
            });
        }

        let error = decode_error(response).await?;
        if error.kind == "UserNotConfirmedException" {
            return Ok(ProviderSignIn {
                user_id: String::new(),
                session: None,
                needs_verification: true,
            });
        }
        Err(map_sign_in_error(&error.kind, &error.message))
    }

    /// Exchange a refresh token for a fresh access/ID token pair
    ///
    /// The provider does not rotate refresh tokens; the input token is
    /// carried forward unchanged in the returned session.
    pub async fn refresh_session(&self, refresh_token: &str) -> Result<IssuedSession, AuthError> {
        let response: RefreshResponse = self
            .call(
                "/token",
                &serde_json::json!({
                    "client_id": self.config.client_id,
                    "grant_type": "refresh_token",
                    "refresh_token": refresh_token,
                }),
                map_refresh_error,
            )
            .await?;

        match response.authentication_result {
            Some(result) => Ok(session_from_refresh(result, refresh_token)),
            None => Err(AuthError::RefreshInvalid),
        }
    }

    /// Resolve the identity behind an access or ID token
    ///
    /// Any rejection by the provider (expired, malformed, revoked) collapses
    /// to the single kind `TokenInvalid`; the granular reason is logged here
    /// as a security event and not surfaced.
    pub async fn get_current_user(&self, token: &str) -> Result<ProviderUser, AuthError> {
        let response = self
            .send("/user", &serde_json::json!({ "access_token": token }))
            .await?;

        if response.status().is_success() {
            return decode_body(response).await;
        }

        let error = decode_error(response).await?;
        warn!(
            kind = %error.kind,
            "identity provider rejected a token"
        );
        Err(AuthError::TokenInvalid)
    }

    /// Probe whether an account exists for this email, without side effects
    pub async fn account_exists(&self, email: &str) -> Result<bool, AuthError> {
        let response: LookupResponse = self
            .call(
                "/users/lookup",
                &serde_json::json!({
                    "client_id": self.config.client_id,
                    "email": email,
                }),
                |kind, message| AuthError::GatewayUnavailable(format!("{kind}: {message}")),
            )
            .await?;
        Ok(response.exists)
    }

    /// Start the provider's password-reset flow
    pub async fn request_password_reset(&self, email: &str) -> Result<(), AuthError> {
        let _: serde_json::Value = self
            .call(
                "/forgot",
                &serde_json::json!({
                    "client_id": self.config.client_id,
                    "email": email,
                }),
                map_resend_error,
            )
            .await?;
        Ok(())
    }

    /// Complete the provider's password-reset flow
    pub async fn confirm_password_reset(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let _: serde_json::Value = self
            .call(
                "/reset",
                &serde_json::json!({
                    "client_id": self.config.client_id,
                    "email": email,
                    "code": code,
                    "password": new_password,
                }),
                map_reset_error,
            )
            .await?;
        Ok(())
    }

    async fn send(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, AuthError> {
        let url = format!("{}{}", self.config.base_url, path);
        self.http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| AuthError::GatewayUnavailable(e.to_string()))
    }

    async fn call<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
        map_error: fn(&str, &str) -> AuthError,
    ) -> Result<T, AuthError> {
        let response = self.send(path, body).await?;
        if response.status().is_success() {
            decode_body(response).await
        } else {
            let error = decode_error(response).await?;
            Err(map_error(&error.kind, &error.message))
        }
    }
}

async fn decode_body<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, AuthError> {
    response
        .json()
        .await
        .map_err(|e| AuthError::GatewayUnavailable(format!("malformed provider response: {e}")))
}

async fn decode_error(response: reqwest::Response) -> Result<ProviderError, AuthError> {
    response
        .json()
        .await
        .map_err(|e| AuthError::GatewayUnavailable(format!("malformed provider error: {e}")))
}

/// Interpret the provider's confirmation reply
///
/// Only an explicit `complete == true` is a success; anything else is the
/// error `IncompleteConfirmation`.
fn confirmation_outcome(response: ConfirmResponse) -> Result<(), AuthError> {
    if response.complete {
        Ok(())
    } else {
        Err(AuthError::IncompleteConfirmation)
    }
}

/// Build the session for a completed sign-in
///
/// Sign-in is the one operation that must issue a refresh token; its absence
/// is a broken provider contract.
fn session_from_login(result: AuthenticationResult) -> Result<IssuedSession, AuthError> {
    let refresh_token = result.refresh_token.ok_or_else(|| {
        AuthError::GatewayUnavailable("provider issued no refresh token on sign-in".to_string())
    })?;
    Ok(IssuedSession {
        access_token: result.access_token,
        id_token: result.id_token,
        refresh_token,
        expires_in: result.expires_in,
        token_type: result.token_type,
    })
}

/// Build the session for a refresh exchange
///
/// The input refresh token is always carried forward unchanged, regardless
/// of anything the provider may have echoed back.
fn session_from_refresh(result: AuthenticationResult, refresh_token: &str) -> IssuedSession {
    IssuedSession {
        access_token: result.access_token,
        id_token: result.id_token,
        refresh_token: refresh_token.to_string(),
        expires_in: result.expires_in,
        token_type: result.token_type,
    }
}

fn map_sign_up_error(kind: &str, message: &str) -> AuthError {
    match kind {
        "InvalidPasswordException" | "InvalidParameterException" => AuthError::InvalidPassword,
        "UsernameExistsException" => AuthError::AccountExists,
        "TooManyRequestsException" | "LimitExceededException" => AuthError::RateLimited,
        _ => unknown(kind, message),
    }
}

fn map_confirm_error(kind: &str, message: &str) -> AuthError {
    match kind {
        "CodeMismatchException" => AuthError::CodeMismatch,
        "ExpiredCodeException" => AuthError::CodeExpired,
        "UserNotFoundException" => AuthError::AccountNotFound,
        "NotAuthorizedException" => AuthError::AlreadyConfirmed,
        "TooManyRequestsException" | "LimitExceededException" => AuthError::RateLimited,
        _ => unknown(kind, message),
    }
}

fn map_resend_error(kind: &str, message: &str) -> AuthError {
    match kind {
        // The provider reports resend-for-a-confirmed-user as a parameter error.
        "InvalidParameterException" => AuthError::AlreadyConfirmed,
        "UserNotFoundException" => AuthError::AccountNotFound,
        "TooManyRequestsException" | "LimitExceededException" => AuthError::RateLimited,
        _ => unknown(kind, message),
    }
}

fn map_sign_in_error(kind: &str, message: &str) -> AuthError {
    match kind {
        "NotAuthorizedException" => AuthError::Unauthenticated,
        "UserNotFoundException" => AuthError::AccountNotFound,
        "TooManyRequestsException" | "LimitExceededException" => AuthError::RateLimited,
        _ => unknown(kind, message),
    }
}

fn map_refresh_error(kind: &str, message: &str) -> AuthError {
    match kind {
        "NotAuthorizedException" => AuthError::SessionExpired,
        "TooManyRequestsException" | "LimitExceededException" => AuthError::RateLimited,
        _ => unknown(kind, message),
    }
}

fn map_reset_error(kind: &str, message: &str) -> AuthError {
    match kind {
        "CodeMismatchException" => AuthError::CodeMismatch,
        "ExpiredCodeException" => AuthError::CodeExpired,
        "UserNotFoundException" => AuthError::AccountNotFound,
        "InvalidPasswordException" | "InvalidParameterException" => AuthError::InvalidPassword,
        "TooManyRequestsException" | "LimitExceededException" => AuthError::RateLimited,
        _ => unknown(kind, message),
    }
}

/// A provider error we cannot interpret is a broken contract, not a logical
/// rejection we could act on.
fn unknown(kind: &str, message: &str) -> AuthError {
    AuthError::GatewayUnavailable(format!("unexpected provider error {kind}: {message}"))
}
