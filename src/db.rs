//! Database module for Quotewatch
//!
//! Manages the SQLite connection pool with WAL mode and persists monitor
//! state as JSON documents so it survives process restarts. Three documents
//! are kept: runtime settings, alert/trigger state, and the latest PnL
//! snapshot.

use crate::config::DatabaseConfig;
use crate::error::{AppError, AppResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use tracing::info;

/// Type alias for the SQLite connection pool
pub type DbPool = Pool<Sqlite>;

/// Document key for mutable runtime settings
pub const DOC_SETTINGS: &str = "settings";
/// Document key for price history and trigger state
pub const DOC_ALERT_STATE: &str = "alert_state";
/// Document key for the latest completed PnL snapshot
pub const DOC_PNL: &str = "pnl";

/// Embedded schema; a single key/value document table is all the monitor needs
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    key TEXT PRIMARY KEY,
    body TEXT NOT NULL,
    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
)
"#;

/// Initialize the database connection pool
pub async fn init_pool(config: &DatabaseConfig) -> AppResult<DbPool> {
    // Ensure data directory exists
    if let Some(parent) = config.path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Database(sqlx::Error::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    format!("Failed to create database directory: {}", e),
                )))
            })?;
            info!("Created database directory: {:?}", parent);
        }
    }

    let db_url = format!("sqlite:{}?mode=rwc", config.path.display());

    let connect_options = SqliteConnectOptions::from_str(&db_url)
        .map_err(AppError::Database)?
        // Enable WAL mode for concurrent reads
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .busy_timeout(std::time::Duration::from_secs(5))
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect_with(connect_options)
        .await?;

    info!(
        "Database pool initialized: {:?} (max {} connections)",
        config.path, config.max_connections
    );

    Ok(pool)
}

/// Apply the embedded schema
pub async fn run_migrations(pool: &DbPool) -> AppResult<()> {
    sqlx::query(SCHEMA).execute(pool).await?;
    info!("Database schema applied");
    Ok(())
}

/// Upsert a JSON document
pub async fn save_document<T: Serialize>(pool: &DbPool, key: &str, value: &T) -> AppResult<()> {
    let body = serde_json::to_string(value)
        .map_err(|e| AppError::Internal(format!("Failed to serialize document {}: {}", key, e)))?;

    sqlx::query(
        r#"
        INSERT INTO documents (key, body, updated_at)
        VALUES (?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(key) DO UPDATE SET body = excluded.body, updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(key)
    .bind(body)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load a JSON document; `None` when no prior state exists
pub async fn load_document<T: DeserializeOwned>(pool: &DbPool, key: &str) -> AppResult<Option<T>> {
    let row: Option<(String,)> = sqlx::query_as("SELECT body FROM documents WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;

    match row {
        Some((body,)) => {
            let value = serde_json::from_str(&body).map_err(|e| {
                AppError::Internal(format!("Failed to deserialize document {}: {}", key, e))
            })?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}
