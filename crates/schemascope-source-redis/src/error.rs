//! Error types for the Redis adapter.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RedisSourceError {
    #[error("invalid redis url: {0}")]
    InvalidUrl(#[source] redis::RedisError),

    #[error("redis connection failed: {0}")]
    Connect(#[source] redis::RedisError),

    #[error("redis command failed: {0}")]
    Command(#[from] redis::RedisError),
}
