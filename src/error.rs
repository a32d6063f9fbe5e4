//! Error types for Quotewatch
//!
//! Nothing in this taxonomy is fatal to the monitor: upstream failures
//! degrade to a skipped cycle with last-known state preserved, and invalid
//! input is rejected at the mutation boundary with state unchanged.

use thiserror::Error;

/// Application-level errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Validation error (malformed threshold, non-positive amount, bad address)
    #[error("Validation error: {0}")]
    Validation(String),

    /// A collaborator call failed or timed out; the current cycle is skipped
    #[error("Upstream unavailable: {0}")]
    Upstream(String),

    /// Collaborator rate limited us; treated like Upstream with cached fallback
    #[error("Rate limited by upstream service")]
    RateLimited,

    /// A refresh is already in flight; the new request was skipped
    #[error("Refresh already in progress")]
    RefreshInProgress,

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;
