//! Database Layer
//!
//! `SQLite` catalog for managed media records and attachment batches.

pub mod models;
pub mod queries;


use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
pub use models::*;
pub use queries::*;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

/// Create the `SQLite` connection pool.
pub async fn create_pool(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        // Prevent hanging requests on pool exhaustion
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(options)
        .await?;

    info!("Connected to SQLite catalog");
    Ok(pool)
}

/// Run database migrations.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database migrations completed");
    Ok(())
}
