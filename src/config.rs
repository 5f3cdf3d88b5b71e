use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub port: u16,
    /// Seconds before an unrefreshed typing state is treated as stopped.
    pub typing_ttl_seconds: u64,
    pub db_max_connections: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, crate::error::AppError> {
        dotenv().ok();
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| crate::error::AppError::Config("DATABASE_URL missing".into()))?;
        let redis_url = env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into());
        let port = env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);
        let typing_ttl_seconds = env::var("TYPING_TTL_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);
        let db_max_connections = env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        Ok(Self {
            database_url,
            redis_url,
            port,
            typing_ttl_seconds,
            db_max_connections,
        })
    }

    pub fn test_defaults() -> Self {
        Self {
            database_url: "postgres://localhost/test".into(),
            redis_url: "redis://127.0.0.1:6379/0".into(),
            port: 3000,
            typing_ttl_seconds: 5,
            db_max_connections: 5,
        }
    }
}
