//! Identity service routes
//!
//! HTTP surface of the identity provider gateway. Handlers are stateless per
//! invocation: no local state is mutated across calls, so concurrent calls
//! for the same email or token are safe by construction.

use axum::{
    Json, Router,
    extract::{Query, State},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::{
    AppState, accounts,
    error::IdentityError,
    provider::{CodeDelivery, IssuedSession},
};

/// Request for initiating a sign-up
#[derive(Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// Response for initiating a sign-up
#[derive(Serialize)]
pub struct SignUpResponse {
    pub user_id: String,
    pub confirmed: bool,
}

/// Request for password sign-in
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Response for password sign-in
#[derive(Serialize)]
pub struct LoginResponse {
    pub user_id: String,
    pub needs_verification: bool,
    pub session: Option<IssuedSession>,
}

/// Query parameters of the confirmation link
#[derive(Deserialize)]
pub struct ConfirmParams {
    pub email: String,
    pub code: String,
    pub redirect: Option<String>,
}

/// Request naming an account by email
#[derive(Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

/// Response for a confirmation-code resend
#[derive(Serialize)]
pub struct ResendResponse {
    pub code_delivery_details: CodeDelivery,
}

/// Request for a session refresh
#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Response for a session refresh
#[derive(Serialize)]
pub struct RefreshResponse {
    pub session: IssuedSession,
}

/// Request for resolving the current user
#[derive(Deserialize)]
pub struct CurrentUserRequest {
    pub access_token: String,
}

/// Request for completing a password reset
#[derive(Deserialize)]
pub struct ResetRequest {
    pub email: String,
    pub code: String,
    pub password: String,
}

/// Create the router for the identity service
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/auth/signup", post(sign_up))
        .route("/auth/login", post(login))
        .route("/auth/confirm", get(confirm))
        .route("/auth/resend", post(resend))
        .route("/auth/refresh", post(refresh))
        .route("/auth/user", post(current_user))
        .route("/auth/exists", get(exists_query).post(exists_body))
        .route("/auth/forgot", post(forgot_password))
        .route("/auth/reset", post(reset_password))
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "identity-service"
    }))
}

/// Initiate a sign-up with the identity provider
pub async fn sign_up(
    State(state): State<AppState>,
    Json(payload): Json<SignUpRequest>,
) -> Result<impl IntoResponse, IdentityError> {
    accounts::validate_email(&payload.email).map_err(IdentityError::BadRequest)?;

    let outcome = state
        .provider
        .initiate_sign_up(
            &payload.email,
            &payload.password,
            &payload.first_name,
            &payload.last_name,
        )
        .await?;

    info!("Sign-up initiated for {}", payload.email);

    Ok((
        axum::http::StatusCode::CREATED,
        Json(SignUpResponse {
            user_id: outcome.user_id,
            confirmed: outcome.confirmed,
        }),
    ))
}

/// Password sign-in
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, IdentityError> {
    info!("Sign-in attempt for {}", payload.email);

    let outcome = state
        .provider
        .sign_in(&payload.email, &payload.password)
        .await?;

    Ok(Json(LoginResponse {
        user_id: outcome.user_id,
        needs_verification: outcome.needs_verification,
        session: outcome.session,
    }))
}

/// Confirm a sign-up from the emailed link
///
/// On success the browser lands on the web confirmation page, unless the
/// link carried a redirect into the app's own URI scheme. Any other redirect
/// target is ignored, so the endpoint cannot be used as an open redirect.
pub async fn confirm(
    State(state): State<AppState>,
    Query(params): Query<ConfirmParams>,
) -> Result<Response, IdentityError> {
    state
        .provider
        .confirm_sign_up(&params.email, &params.code)
        .await?;

    info!("Sign-up confirmed for {}", params.email);

    match confirmation_redirect(params.redirect.as_deref(), &state.deeplink_scheme) {
        Some(target) => Ok(Redirect::to(&target).into_response()),
        None => Ok(Html(CONFIRMED_PAGE).into_response()),
    }
}

/// Resend the confirmation code
pub async fn resend(
    State(state): State<AppState>,
    Json(payload): Json<EmailRequest>,
) -> Result<impl IntoResponse, IdentityError> {
    let delivery = state.provider.resend_confirmation(&payload.email).await?;

    info!("Confirmation code resent for {}", payload.email);

    Ok(Json(ResendResponse {
        code_delivery_details: delivery,
    }))
}

/// Exchange a refresh token for a fresh session
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<impl IntoResponse, IdentityError> {
    let session = state
        .provider
        .refresh_session(&payload.refresh_token)
        .await?;

    Ok(Json(RefreshResponse { session }))
}

/// Resolve the user behind an access or ID token
pub async fn current_user(
    State(state): State<AppState>,
    Json(payload): Json<CurrentUserRequest>,
) -> Result<impl IntoResponse, IdentityError> {
    let user = state
        .provider
        .get_current_user(&payload.access_token)
        .await?;

    Ok(Json(json!({
        "username": user.username,
        "attributes": user.attributes,
    })))
}

/// Existence probe via query string
pub async fn exists_query(
    State(state): State<AppState>,
    Query(payload): Query<EmailRequest>,
) -> Result<impl IntoResponse, IdentityError> {
    account_exists(state, payload.email).await
}

/// Existence probe via JSON body
pub async fn exists_body(
    State(state): State<AppState>,
    Json(payload): Json<EmailRequest>,
) -> Result<impl IntoResponse, IdentityError> {
    account_exists(state, payload.email).await
}

/// Start the password-reset sub-flow
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<EmailRequest>,
) -> Result<impl IntoResponse, IdentityError> {
    state.provider.request_password_reset(&payload.email).await?;

    info!("Password reset requested for {}", payload.email);

    Ok(Json(json!({"message": "Reset code sent"})))
}

/// Complete the password-reset sub-flow
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetRequest>,
) -> Result<impl IntoResponse, IdentityError> {
    state
        .provider
        .confirm_password_reset(&payload.email, &payload.code, &payload.password)
        .await?;

    info!("Password reset completed for {}", payload.email);

    Ok(Json(json!({"message": "Password updated"})))
}

/// Combined existence check across the local profile table and the provider
///
/// The response is a bare boolean: it never reveals which backing store held
/// the match, so the endpoint is useless for source fingerprinting.
async fn account_exists(
    state: AppState,
    email: String,
) -> Result<Json<serde_json::Value>, IdentityError> {
    accounts::validate_email(&email).map_err(IdentityError::BadRequest)?;

    let in_profiles = accounts::email_in_profiles(&state.db_pool, &email).await?;
    // Skip the provider round trip when the local table already answers.
    let exists = if in_profiles {
        true
    } else {
        let in_provider = state.provider.account_exists(&email).await?;
        accounts::merge_existence(in_profiles, in_provider)
    };

    Ok(Json(json!({ "exists": exists })))
}

/// Only honor redirects into the app's own URI scheme
fn confirmation_redirect(redirect: Option<&str>, scheme: &str) -> Option<String> {
    redirect
        .filter(|target| target.starts_with(scheme))
        .map(str::to_string)
}

const CONFIRMED_PAGE: &str = r#"<!DOCTYPE html>
<html>
  <head><title>Email confirmed</title></head>
  <body>
    <h1>Your email is confirmed</h1>
    <p>You can return to the Sereno app and sign in.</p>
  </body>
</html>"#;
