use serde::Deserialize;
use std::env;

// Top-level configuration container for all settings
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub session: SessionConfig,
    pub exam: ExamConfig,
}

// Application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
}

// Database settings
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
}

// Redis settings
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

// Session token settings
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub ttl_hours: i64,
}

// Exam sweeper settings
#[derive(Debug, Clone, Deserialize)]
pub struct ExamConfig {
    pub sweep_interval_seconds: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            app: AppConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8000".to_string())
                    .parse()
                    .expect("PORT must be a valid number"),
                environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
                rust_log: env::var("RUST_LOG")
                    .unwrap_or_else(|_| "portal_system=debug,tower_http=debug".to_string()),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
                pool_size: env::var("DB_POOL_SIZE")
                    .unwrap_or_else(|_| "20".to_string())
                    .parse()
                    .expect("DB_POOL_SIZE must be a valid number"),
            },
            redis: RedisConfig {
                url: env::var("REDIS_URL").expect("REDIS_URL must be set"),
            },
            session: SessionConfig {
                ttl_hours: env::var("SESSION_TTL_HOURS")
                    .unwrap_or_else(|_| "24".to_string())
                    .parse()
                    .expect("SESSION_TTL_HOURS must be a valid number"),
            },
            exam: ExamConfig {
                sweep_interval_seconds: env::var("EXAM_SWEEP_INTERVAL_SECONDS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .expect("EXAM_SWEEP_INTERVAL_SECONDS must be a valid number"),
            },
        }
    }
}
