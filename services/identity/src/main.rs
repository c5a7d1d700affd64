use anyhow::Result;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

mod accounts;
mod error;
mod provider;
mod routes;

use axum::http::{HeaderValue, Method, header};
use common::database::{DatabaseConfig, health_check, init_pool};
use sqlx::PgPool;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::provider::{ProviderClient, ProviderConfig};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub provider: ProviderClient,
    pub deeplink_scheme: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!("Starting identity service");

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    // Check database connectivity
    if health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    // Initialize the identity provider client
    let provider_config = ProviderConfig::from_env()?;
    let provider = ProviderClient::new(provider_config);

    let deeplink_scheme =
        std::env::var("SERENO_DEEPLINK_SCHEME").unwrap_or_else(|_| "sereno://".to_string());

    let app_state = AppState {
        db_pool: pool,
        provider,
        deeplink_scheme,
    };

    info!("Identity service initialized successfully");

    // Start the web server
    let app = routes::create_router(app_state).layer(cors_layer());

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
    info!("Identity service listening on 0.0.0.0:3000");

    axum::serve(listener, app).await?;

    Ok(())
}

/// CORS gate against the fixed allowlist of calling origins
///
/// Origins outside the allowlist get no Access-Control-Allow-Origin header;
/// rejection happens in the calling environment, not in application logic.
fn cors_layer() -> CorsLayer {
    let origins: Vec<HeaderValue> = std::env::var("SERENO_ALLOWED_ORIGINS")
        .unwrap_or_else(|_| "https://app.sereno.app".to_string())
        .split(',')
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}
