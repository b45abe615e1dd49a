//! schemascope-source-postgres: relational adapter and LISTEN/NOTIFY change
//! watcher for PostgreSQL.

pub mod catalog;
pub mod error;
pub mod listener;

pub use catalog::{TableCatalog, connect, introspect};
pub use error::PostgresSourceError;
pub use listener::{forward_notifications, listen, signal_from_payload};
