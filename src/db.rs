use std::time::Duration;

use anyhow::Context;
use sqlx::{MySqlPool, mysql::MySqlPoolOptions};

use crate::config::Config;

/// Connects the pool and brings the schema up to date.
pub async fn init_db(config: &Config) -> anyhow::Result<MySqlPool> {
    let pool = MySqlPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database_url)
        .await
        .context("failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("failed to run database migrations")?;

    tracing::info!(max_connections = config.db_max_connections, "Database ready");
    Ok(pool)
}
