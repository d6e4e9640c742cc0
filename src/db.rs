// ==========================================
// Planilha Import Engine - MySQL Pool Setup
// ==========================================
// Single place that builds the connection pool, so
// every caller gets the same limits and timeouts.
// The pool is acquired at run start and dropped on
// every exit path.
// ==========================================

use crate::config::run_config::DatabaseConfig;
use crate::repository::error::{RepositoryError, RepositoryResult};
use sqlx::mysql::MySqlPoolOptions;
use sqlx::MySqlPool;
use std::time::Duration;

/// Default acquire timeout (seconds)
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;

/// The run is single-threaded with at most one open transaction; a pair
/// of connections covers the transaction plus lookups.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 2;

/// Build the MySQL pool and establish the first connection. Failure here
/// is a setup fault: the run aborts before any file is processed.
pub async fn connect_pool(config: &DatabaseConfig) -> RepositoryResult<MySqlPool> {
    MySqlPoolOptions::new()
        .max_connections(DEFAULT_MAX_CONNECTIONS)
        .acquire_timeout(Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS))
        .connect(&config.url())
        .await
        .map_err(|e| RepositoryError::ConnectionFailed(e.to_string()))
}
