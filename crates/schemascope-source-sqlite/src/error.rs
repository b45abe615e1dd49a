//! Error types for the SQLite adapter.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SqliteSourceError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("sqlite query failed: {0}")]
    Query(#[from] rusqlite::Error),
}
