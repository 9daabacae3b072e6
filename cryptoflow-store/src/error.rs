use cryptoflow_core::normalize::TableError;
use std::path::PathBuf;
use thiserror::Error;

/// Storage and analytics failures.
///
/// Connection and identifier problems are configuration errors: fatal, never retried.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid storage configuration: {0}")]
    InvalidConfig(String),

    #[error("'{0}' is not a valid table name (letters, digits and '_' only, not starting with a digit)")]
    InvalidIdentifier(String),

    #[error("failed to create database directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to connect to database {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("database health check failed: {0}")]
    Ping(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Table(#[from] TableError),
}
