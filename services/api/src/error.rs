//! services/api/src/error.rs
//!
//! Errors that stop the `api` binary from starting or serving. Failures inside
//! a request never reach this type; handlers answer those with an `ErrorBody`.

use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Connecting the pool failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Failed to apply database migrations: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("CLIENT_URL '{origin}' is not a valid CORS origin")]
    InvalidOrigin { origin: String },

    /// Binding the listener, preparing the upload directory, or serving.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
