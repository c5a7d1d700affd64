use anyhow::Result;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

mod error;
mod middleware;
mod records;
mod routes;
mod verifier;

use axum::http::{HeaderValue, Method, header};
use common::database::{DatabaseConfig, health_check, init_pool};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::records::PgRecordStore;
use crate::verifier::IdentityVerifier;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub verifier: IdentityVerifier,
    pub records: PgRecordStore,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!("Starting API service");

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    // Check database connectivity
    if health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    let verifier = IdentityVerifier::from_env()?;

    let app_state = AppState {
        verifier,
        records: PgRecordStore::new(pool),
    };

    info!("API service initialized successfully");

    // Start the web server
    let app = routes::create_router(app_state).layer(cors_layer());

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3001").await?;
    info!("API service listening on 0.0.0.0:3001");

    axum::serve(listener, app).await?;

    Ok(())
}

/// CORS gate against the fixed allowlist of calling origins
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
