//! Capability seam between the runtime and concrete stores.
//!
//! The refresher and multiplexer only see `Connector` and `SourceHandle`;
//! which driver sits behind a handle is decided once, in `connector.rs`.

use std::time::Duration;

use async_trait::async_trait;
use schemascope_core::{ChangeSignal, SourceConfig, StructuralEntity};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source {source_name} unavailable: {detail}")]
    Unavailable { source_name: String, detail: String },

    #[error("source {source_name} timed out after {elapsed:?}")]
    Timeout {
        source_name: String,
        elapsed: Duration,
    },

    #[error("introspection of {source_name} failed: {detail}")]
    Introspection { source_name: String, detail: String },

    #[error("watch setup for {source_name} failed: {detail}")]
    Watch { source_name: String, detail: String },
}

impl SourceError {
    pub fn unavailable(source_name: &str, err: impl std::fmt::Display) -> Self {
        Self::Unavailable {
            source_name: source_name.to_string(),
            detail: err.to_string(),
        }
    }

    pub fn introspection(source_name: &str, err: impl std::fmt::Display) -> Self {
        Self::Introspection {
            source_name: source_name.to_string(),
            detail: err.to_string(),
        }
    }

    pub fn watch(source_name: &str, err: impl std::fmt::Display) -> Self {
        Self::Watch {
            source_name: source_name.to_string(),
            detail: err.to_string(),
        }
    }
}

/// A ready binding to one configured store.
#[async_trait]
pub trait SourceHandle: Send + Sync {
    /// Enumerate the store's structural entities.
    async fn introspect(&self) -> Result<Vec<StructuralEntity>, SourceError>;

    /// Subscribe to the store's native change notifications and forward them
    /// into `tx` from a spawned task.
    ///
    /// Returns `Ok(None)` for stores without a notification mechanism.
    async fn watch(
        &self,
        tx: mpsc::Sender<ChangeSignal>,
    ) -> Result<Option<JoinHandle<()>>, SourceError>;
}

/// Connection-pool collaborator: a ready handle for a source, or
/// `SourceError::Unavailable`.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn acquire(&self, config: &SourceConfig) -> Result<Box<dyn SourceHandle>, SourceError>;
}
