//! Fan-out of snapshots and edge events to every connected observer.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use schemascope_core::{ChangeEvent, Diagram};
use serde::Serialize;
use tokio::sync::{RwLock, broadcast};

use crate::refresh::Refresher;

/// Pending messages per observer before it starts lagging.
const CHANNEL_CAPACITY: usize = 64;

pub type Snapshot = Arc<Vec<Diagram>>;

/// Message pushed to observers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Push {
    UpdateDiagram(Snapshot),
    DataFlow(ChangeEvent),
}

pub struct Broadcaster {
    tx: broadcast::Sender<Push>,
    latest: RwLock<Option<Snapshot>>,
    snapshots_published: AtomicU64,
    edges_published: AtomicU64,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl Broadcaster {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            latest: RwLock::new(None),
            snapshots_published: AtomicU64::new(0),
            edges_published: AtomicU64::new(0),
        }
    }

    /// Subscribe a new observer and return its catch-up snapshot.
    ///
    /// Subscribing happens before the latest snapshot is read, so a broadcast
    /// racing with registration is delivered at least once. When no snapshot
    /// exists yet, one refresh is performed for this observer.
    pub async fn register(&self, refresher: &Refresher) -> (Snapshot, broadcast::Receiver<Push>) {
        let rx = self.tx.subscribe();
        if let Some(snapshot) = self.latest().await {
            return (snapshot, rx);
        }
        let fresh: Snapshot = Arc::new(refresher.refresh().await);
        let mut latest = self.latest.write().await;
        let snapshot = latest.get_or_insert_with(|| Arc::clone(&fresh)).clone();
        (snapshot, rx)
    }

    pub async fn latest(&self) -> Option<Snapshot> {
        self.latest.read().await.clone()
    }

    /// Replace the latest snapshot and relay it to every observer.
    pub async fn publish_snapshot(&self, diagrams: Vec<Diagram>) -> Snapshot {
        let snapshot: Snapshot = Arc::new(diagrams);
        *self.latest.write().await = Some(Arc::clone(&snapshot));
        self.snapshots_published.fetch_add(1, Ordering::Relaxed);
        // No observers is fine.
        let _ = self.tx.send(Push::UpdateDiagram(Arc::clone(&snapshot)));
        snapshot
    }

    pub fn publish_edge(&self, event: ChangeEvent) {
        self.edges_published.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(name = %event.name, from = %event.from, to = %event.to, "edge event");
        let _ = self.tx.send(Push::DataFlow(event));
    }

    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn snapshots_published(&self) -> u64 {
        self.snapshots_published.load(Ordering::Relaxed)
    }

    pub fn edges_published(&self) -> u64 {
        self.edges_published.load(Ordering::Relaxed)
    }
}
