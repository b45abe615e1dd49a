//! Error types for the PostgreSQL adapter.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PostgresSourceError {
    #[error("postgres connection failed: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("postgres query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("LISTEN {channel} failed: {source}")]
    Listen {
        channel: String,
        #[source]
        source: sqlx::Error,
    },
}
