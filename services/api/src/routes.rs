//! Access gateway routes

use axum::{
    Extension, Json, Router, middleware as axum_middleware,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::info;

use crate::{
    AppState,
    error::ApiError,
    middleware::require_auth,
    records::authorized_write,
    verifier::AuthorizationContext,
};

/// Request for an authenticated record write
#[derive(Deserialize)]
pub struct WriteRequest {
    pub resource: String,
    pub record: Map<String, Value>,
}

/// Create the router for the access gateway
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/data/write", post(write_record))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    Router::new()
        .route("/health", get(health_check))
        .merge(protected)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "api-service"
    }))
}

/// Persist a record on behalf of the authenticated caller
pub async fn write_record(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthorizationContext>,
    Json(payload): Json<WriteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let row = authorized_write(&state.records, &ctx, &payload.resource, payload.record).await?;

    info!(
        user_id = %ctx.user_id,
        resource = %payload.resource,
        "record persisted"
    );

    Ok((StatusCode::CREATED, Json(json!({ "data": row }))))
}
