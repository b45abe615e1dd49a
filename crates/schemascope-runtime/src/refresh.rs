//! Full refresh: introspect every configured source and rebuild all diagrams.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use schemascope_core::{Diagram, DiagramBuilder, SourceConfig, StructuralEntity};

use crate::source::{Connector, SourceError};

pub struct Refresher {
    sources: Vec<SourceConfig>,
    connector: Arc<dyn Connector>,
    builder: DiagramBuilder,
    source_timeout: Duration,
}

impl Refresher {
    pub fn new(
        sources: Vec<SourceConfig>,
        connector: Arc<dyn Connector>,
        builder: DiagramBuilder,
        source_timeout: Duration,
    ) -> Self {
        Self {
            sources,
            connector,
            builder,
            source_timeout,
        }
    }

    pub fn sources(&self) -> &[SourceConfig] {
        &self.sources
    }

    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::clone(&self.connector)
    }

    pub fn source_timeout(&self) -> Duration {
        self.source_timeout
    }

    /// Rebuild the complete diagram set.
    ///
    /// Sources are introspected concurrently, each under its own timeout. An
    /// unreachable, failing or slow source contributes no diagrams; the rest
    /// of the set is unaffected. Output follows configuration order.
    pub async fn refresh(&self) -> Vec<Diagram> {
        let per_source = join_all(self.sources.iter().map(|cfg| self.refresh_source(cfg))).await;
        let diagrams: Vec<Diagram> = per_source.into_iter().flatten().collect();
        tracing::debug!(
            sources = self.sources.len(),
            diagrams = diagrams.len(),
            "refresh complete"
        );
        diagrams
    }

    async fn refresh_source(&self, config: &SourceConfig) -> Vec<Diagram> {
        let result = tokio::time::timeout(self.source_timeout, self.introspect_source(config))
            .await
            .unwrap_or_else(|_| {
                Err(SourceError::Timeout {
                    source_name: config.name.clone(),
                    elapsed: self.source_timeout,
                })
            });
        match result {
            Ok(entities) => self.builder.build(&config.name, &entities),
            Err(e) => {
                tracing::warn!(
                    source = %config.name,
                    kind = %config.kind(),
                    error = %e,
                    "skipping source"
                );
                Vec::new()
            }
        }
    }

    async fn introspect_source(
        &self,
        config: &SourceConfig,
    ) -> Result<Vec<StructuralEntity>, SourceError> {
        let handle = self.connector.acquire(config).await?;
        handle.introspect().await
    }
}
