//! schemascope-source-redis: key-value adapter and keyspace-notification
//! change watcher for Redis.

pub mod catalog;
pub mod error;
pub mod watcher;

pub use catalog::{KeyspaceCatalog, client, connect, introspect};
pub use error::RedisSourceError;
pub use watcher::{
    forward_keyspace_events, signal_from_key, signal_from_payload, subscribe_keyspace,
};
