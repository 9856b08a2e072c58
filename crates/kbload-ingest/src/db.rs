//! Reference database connection

use crate::error::{LoadError, Result};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// One load runs one statement at a time; the spare connection covers COPY.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 2;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
/// Shown in `pg_stat_activity` while a load holds its connections.
pub const APPLICATION_NAME: &str = "kbload";

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout: Duration,
}

impl DbConfig {
    pub fn from_env() -> Result<Self> {
        let url = std::env::var("DATABASE_URL")
            .map_err(|_| LoadError::config("DATABASE_URL not set; a full load needs the reference database"))?;

        Ok(Self {
            url,
            max_connections: env_number("DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS),
            connect_timeout: Duration::from_secs(env_number("DB_CONNECT_TIMEOUT", DEFAULT_CONNECT_TIMEOUT_SECS)),
        })
    }
}

fn env_number<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

pub async fn create_pool(config: &DbConfig) -> Result<PgPool> {
    let options = PgConnectOptions::from_str(&config.url)?.application_name(APPLICATION_NAME);
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.connect_timeout)
        .connect_with(options)
        .await?;

    info!(max_connections = config.max_connections, "Connected to reference database");
    Ok(pool)
}
