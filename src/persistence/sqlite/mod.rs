//! SQLite implementation of the alert store.

use std::{str::FromStr, time::Duration};

use chrono::{DateTime, Utc};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};

mod alert_store;

use crate::persistence::error::PersistenceError;

/// [`AlertStore`](crate::persistence::AlertStore) backed by SQLite.
pub struct SqliteAlertStore {
    /// The SQLite connection pool used for database operations.
    pool: SqlitePool,
}

impl SqliteAlertStore {
    /// Connects to the database at `database_url`, creating the file if it
    /// does not exist.
    #[tracing::instrument(level = "info")]
    pub async fn new(database_url: &str) -> Result<Self, PersistenceError> {
        tracing::debug!(database_url, "Attempting to connect to SQLite database.");
        let in_memory = database_url.contains(":memory:");
        let mut options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| PersistenceError::InvalidInput(e.to_string()))?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // An in-memory database lives and dies with its only connection.
        let mut pool_options = SqlitePoolOptions::new().max_connections(8);
        if in_memory {
            pool_options = pool_options.max_connections(1).idle_timeout(None).max_lifetime(None);
        }
        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| {
                PersistenceError::OperationFailed(format!("Failed to connect to database: {}", e))
            })?;
        tracing::info!(database_url, "Successfully connected to SQLite database.");
        Ok(Self { pool })
    }

    /// Runs database migrations.
    #[tracing::instrument(skip(self), level = "info")]
    pub async fn run_migrations(&self) -> Result<(), PersistenceError> {
        tracing::debug!("Running database migrations.");
        sqlx::migrate!("./migrations").run(&self.pool).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to run database migrations.");
            PersistenceError::MigrationError(e.to_string())
        })?;
        tracing::info!("Database migrations completed successfully.");
        Ok(())
    }

    /// Closes the connection pool gracefully.
    #[tracing::instrument(skip(self), level = "info")]
    pub async fn close(&self) {
        tracing::debug!("Closing SQLite connection pool.");
        self.pool.close().await;
        tracing::info!("SQLite connection pool closed successfully.");
    }

    /// Helper to execute database queries with consistent error handling
    async fn execute_query_with_error_handling<F, T, E>(
        &self,
        operation: &str,
        query_fn: F,
    ) -> Result<T, PersistenceError>
    where
        F: std::future::Future<Output = Result<T, E>>,
        E: std::error::Error,
    {
        query_fn.await.map_err(|e| {
            tracing::error!(error = %e, operation = %operation, "Database operation failed.");
            PersistenceError::OperationFailed(e.to_string())
        })
    }
}

fn from_unix_secs(secs: i64) -> Result<DateTime<Utc>, PersistenceError> {
    DateTime::from_timestamp(secs, 0).ok_or_else(|| {
        PersistenceError::SerializationError(format!("timestamp out of range: {secs}"))
    })
}

fn from_unix_millis(millis: i64) -> Result<DateTime<Utc>, PersistenceError> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        PersistenceError::SerializationError(format!("timestamp out of range: {millis}"))
    })
}
