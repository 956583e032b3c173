use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, Pool, Postgres};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;
use tracing::log::LevelFilter;

use crate::config::settings::AppConfig;

pub type DbPool = Pool<Postgres>;

const APPLICATION_NAME: &str = "media-service";

/// The encode queue writes one status row at a time, so a single idle
/// connection is enough to keep around.
fn pool_options(config: &AppConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.db_max_connections.max(1))
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
}

pub async fn connect_to_db(config: &AppConfig) -> Result<DbPool, sqlx::Error> {
    let options = PgConnectOptions::from_str(&config.database_url)?
        .application_name(APPLICATION_NAME)
        .log_statements(LevelFilter::Debug)
        .log_slow_statements(LevelFilter::Warn, Duration::from_secs(1));

    let pool = pool_options(config).connect_with(options).await?;

    info!(
        max_connections = config.db_max_connections,
        table = %config.video_status_table,
        "✅ Connected to PostgreSQL"
    );
    Ok(pool)
}
