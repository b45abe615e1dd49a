//! schemascope-source-sqlite: relational adapter for SQLite files.
//! Synchronous; callers run it on a blocking thread. SQLite has no change
//! notification channel, so this source relies on the refresh timer.

pub mod catalog;
pub mod error;

pub use catalog::{SchemaCatalog, introspect, open_read_only};
pub use error::SqliteSourceError;
