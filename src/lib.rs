pub mod config;
pub mod database;
pub mod redis_client;
pub mod models;
pub mod controllers;
pub mod middleware;
pub mod services;

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use services::guess::GuessGame;

// Shared state for the whole application
pub struct AppState {
    pub db: database::Database,
    pub redis: redis_client::RedisClient,
    // In-memory guessing-game rounds; disposable by design
    pub games: RwLock<HashMap<Uuid, GuessGame>>,
    pub config: config::Config,
}

impl AppState {
    pub async fn new(config: config::Config) -> Result<Arc<Self>, Box<dyn std::error::Error>> {
        let db = database::Database::new(&config.database.url, config.database.pool_size).await?;

        db.run_migrations().await?;

        let redis = redis_client::RedisClient::new(&config.redis.url).await?;
        let state = Arc::new(Self {
            db,
            redis,
            games: RwLock::new(HashMap::new()),
            config,
        });

        Ok(state)
    }
}
