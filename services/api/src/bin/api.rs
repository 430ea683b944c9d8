//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, RedisRateLimiter, SupabaseAuthAdapter},
    config::Config,
    error::ApiError,
    web::{build_router, rest::ApiDoc, state::AppState},
};
use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderValue, Method,
};
use course_ratings_core::ports::RateLimiter;
use course_ratings_core::rate_limit::RATE_LIMIT_WINDOW;
use course_ratings_core::{InMemoryRateLimiter, RatingsService};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!(mode = ?config.log_mode, "Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    if config.run_migrations {
        info!("Running database migrations...");
        db_adapter.run_migrations().await?;
        info!("Database migrations complete.");
    }

    // --- 3. Initialize Service Adapters ---
    let limiter: Arc<dyn RateLimiter> = match &config.redis_url {
        Some(redis_url) => {
            info!("Using the shared rate-limit store");
            Arc::new(RedisRateLimiter::connect(redis_url).await?)
        }
        None => {
            info!("REDIS_URL not set, rate limits are kept in process");
            let in_memory = Arc::new(InMemoryRateLimiter::new());
            spawn_purge_task(in_memory.clone());
            in_memory
        }
    };
    let auth_adapter = Arc::new(SupabaseAuthAdapter::new(
        &config.supabase_url,
        config.supabase_anon_key.clone(),
    )?);
    let service = Arc::new(RatingsService::new(db_adapter, limiter, config.log_mode));

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        service,
        auth: auth_adapter,
        config: config.clone(),
    });

    let origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS origin '{}': {e}", config.cors_origin))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    let app = build_router(app_state)
        .layer(cors)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Drops expired windows so idle identifiers do not accumulate.
fn spawn_purge_task(limiter: Arc<InMemoryRateLimiter>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(RATE_LIMIT_WINDOW);
        loop {
            interval.tick().await;
            limiter.purge_expired(Instant::now());
        }
    });
}
