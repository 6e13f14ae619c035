//! PostgreSQL connection pool management

use charge_core::config::DatabaseConfig;
use charge_core::{AppError, AppResult};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{info, warn};

/// Default connection timeout in seconds
const DEFAULT_CONNECT_TIMEOUT: u64 = 30;

/// Default idle timeout in seconds
const DEFAULT_IDLE_TIMEOUT: u64 = 600;

/// Create a PostgreSQL connection pool from the `database` config section
///
/// Every ledger unit of work holds one pooled connection for its lifetime,
/// so `max_connections` bounds concurrent ledger mutations.
///
/// ```no_run
/// use charge_core::config::DatabaseConfig;
/// use charge_db::create_pool;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = DatabaseConfig {
///         url: "postgresql://localhost/charges".to_string(),
///         max_connections: 5,
///     };
///     let pool = create_pool(&config).await?;
///     Ok(())
/// }
/// ```
pub async fn create_pool(config: &DatabaseConfig) -> AppResult<PgPool> {
    info!("Creating database connection pool");

    let max_conns = config.max_connections;

    let pool = PgPoolOptions::new()
        .max_connections(max_conns)
        .acquire_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT))
        .idle_timeout(Some(Duration::from_secs(DEFAULT_IDLE_TIMEOUT)))
        .test_before_acquire(true)
        .connect(&config.url)
        .await
        .map_err(|e| {
            warn!("Failed to create database pool: {}", e);
            AppError::Pool(format!("Failed to connect to database: {}", e))
        })?;

    info!(
        "Database pool created successfully with {} max connections",
        max_conns
    );

    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .map_err(|e| AppError::Database(format!("Database health check failed: {}", e)))?;

    info!("Database connection verified");

    Ok(pool)
}
