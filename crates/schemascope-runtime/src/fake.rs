//! In-memory `Connector` for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use schemascope_core::{ChangeSignal, Column, Connection, SourceConfig, StructuralEntity, Table};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::source::{Connector, SourceError, SourceHandle};

#[derive(Debug, Clone)]
pub enum FakeSource {
    /// Introspects fine, no change notifications.
    Entities(Vec<StructuralEntity>),
    /// Introspects fine and accepts a watch; signals are injected via
    /// `FakeConnector::tap`.
    Watchable(Vec<StructuralEntity>),
    /// Introspects fine, watch setup fails.
    WatchFails(Vec<StructuralEntity>),
    FailIntrospect,
    Unavailable,
    /// Introspection never completes.
    Hang,
}

impl FakeSource {
    pub fn entities(entities: Vec<StructuralEntity>) -> Self {
        Self::Entities(entities)
    }
}

pub fn table(name: &str, columns: &[&str]) -> StructuralEntity {
    StructuralEntity::Table(Table {
        name: name.to_string(),
        columns: columns
            .iter()
            .map(|c| Column {
                name: c.to_string(),
                data_type: "int".to_string(),
            })
            .collect(),
    })
}

type Taps = Arc<Mutex<HashMap<String, mpsc::Sender<ChangeSignal>>>>;

#[derive(Default)]
pub struct FakeConnector {
    sources: Vec<(String, FakeSource)>,
    introspect_calls: Arc<AtomicUsize>,
    taps: Taps,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, source: FakeSource) -> Self {
        self.sources.push((name.to_string(), source));
        self
    }

    /// Configs for every fake source, in insertion order.
    pub fn configs(&self) -> Vec<SourceConfig> {
        self.sources
            .iter()
            .map(|(name, _)| SourceConfig {
                name: name.clone(),
                connection: Connection::Sqlite {
                    path: format!("{name}.sqlite"),
                },
            })
            .collect()
    }

    pub fn introspect_calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.introspect_calls)
    }

    /// Shared map of established watches, keyed by source name.
    pub fn taps(&self) -> Taps {
        Arc::clone(&self.taps)
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn acquire(&self, config: &SourceConfig) -> Result<Box<dyn SourceHandle>, SourceError> {
        let source = self
            .sources
            .iter()
            .find(|(name, _)| name == &config.name)
            .map(|(_, s)| s.clone())
            .ok_or_else(|| SourceError::unavailable(&config.name, "not configured"))?;
        if matches!(source, FakeSource::Unavailable) {
            return Err(SourceError::unavailable(&config.name, "connection refused"));
        }
        Ok(Box::new(FakeHandle {
            name: config.name.clone(),
            source,
            calls: Arc::clone(&self.introspect_calls),
            taps: Arc::clone(&self.taps),
        }))
    }
}

struct FakeHandle {
    name: String,
    source: FakeSource,
    calls: Arc<AtomicUsize>,
    taps: Taps,
}

#[async_trait]
impl SourceHandle for FakeHandle {
    async fn introspect(&self) -> Result<Vec<StructuralEntity>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.source {
            FakeSource::Entities(e) | FakeSource::Watchable(e) | FakeSource::WatchFails(e) => {
                Ok(e.clone())
            }
            FakeSource::FailIntrospect => Err(SourceError::introspection(&self.name, "boom")),
            FakeSource::Hang => std::future::pending().await,
            FakeSource::Unavailable => Err(SourceError::unavailable(&self.name, "down")),
        }
    }

    async fn watch(
        &self,
        tx: mpsc::Sender<ChangeSignal>,
    ) -> Result<Option<JoinHandle<()>>, SourceError> {
        match &self.source {
            FakeSource::Watchable(_) => {
                self.taps
                    .lock()
                    .expect("taps lock")
                    .insert(self.name.clone(), tx);
                Ok(Some(tokio::spawn(std::future::pending())))
            }
            FakeSource::WatchFails(_) => Err(SourceError::watch(&self.name, "auth failed")),
            _ => Ok(None),
        }
    }
}
