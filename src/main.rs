use anyhow::Context;
use axum::{routing::get, Router};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use portal_system::{
    config::Config,
    controllers,
    database::Database,
    redis_client::RedisClient,
    services::sweeper::SessionSweeper,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.app.rust_log))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Portal API ({})", config.app.environment);

    // Connect to the database
    let db = Database::new(&config.database.url, config.database.pool_size)
        .await
        .context("Failed to connect to database")?;
    info!("Database connected");

    // Run migrations
    db.run_migrations()
        .await
        .context("Failed to run migrations")?;

    // Connect to Redis (backs the ATM ledger)
    let redis = RedisClient::new(&config.redis.url)
        .await
        .context("Failed to connect to Redis")?;
    info!("Redis connected");

    // Create the shared application state
    let app_state = Arc::new(AppState {
        db: db.clone(),
        redis: redis.clone(),
        games: tokio::sync::RwLock::new(HashMap::new()),
        config: config.clone(),
    });

    // --- Start background tasks ---

    // Auto-submit exam sessions whose countdown has run out and evict
    // abandoned guessing-game rounds
    let sweeper = SessionSweeper::new(app_state.clone());
    let sweep_interval = config.exam.sweep_interval_seconds;
    task::spawn(async move {
        loop {
            sweeper.run_sweep().await;
            sweeper.evict_stale_games().await;
            tokio::time::sleep(Duration::from_secs(sweep_interval)).await;
        }
    });

    // --- Start the web server ---

    let app = Router::new()
        .route("/", get(|| async { "Portal API v1.0" }))
        .route("/health", get(|| async { "OK" }))
        // Mount the routes from the controllers module
        .nest("/api", controllers::routes())
        .with_state(app_state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.app.port));
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind listen address")?;
    axum::serve(listener, app.into_make_service())
        .await
        .context("Server error")?;

    Ok(())
}
