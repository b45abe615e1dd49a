//! Notification multiplexer: timer + change watchers → full refreshes.
//!
//! Watchers push `ChangeSignal`s into a single queue. Every timer tick and
//! every signal spawns its own refresh task; refreshes may overlap and are
//! never coalesced. A task publishes its snapshot first and then, for a
//! signal with a target, exactly one edge event, so the edge endpoints are
//! present in the snapshot the observer just received.

use std::sync::Arc;
use std::time::Duration;

use schemascope_core::{ChangeSignal, change_event};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::broadcast::Broadcaster;
use crate::refresh::Refresher;
use crate::source::SourceError;

/// Signal queue capacity (watchers → multiplexer).
const SIGNAL_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    Timer,
    Watch(ChangeSignal),
}

struct Watcher {
    source: String,
    task: JoinHandle<()>,
}

pub struct Multiplexer {
    refresher: Arc<Refresher>,
    broadcaster: Arc<Broadcaster>,
    poll_interval: Duration,
    signal_tx: mpsc::Sender<ChangeSignal>,
    signal_rx: mpsc::Receiver<ChangeSignal>,
    watchers: Vec<Watcher>,
    refreshes: TaskTracker,
    cancel: CancellationToken,
}

impl Multiplexer {
    pub fn new(
        refresher: Arc<Refresher>,
        broadcaster: Arc<Broadcaster>,
        poll_interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        let (signal_tx, signal_rx) = mpsc::channel(SIGNAL_QUEUE_CAPACITY);
        Self {
            refresher,
            broadcaster,
            poll_interval,
            signal_tx,
            signal_rx,
            watchers: Vec::new(),
            refreshes: TaskTracker::new(),
            cancel,
        }
    }

    /// Names of sources with an established watcher.
    pub fn watched_sources(&self) -> Vec<&str> {
        self.watchers.iter().map(|w| w.source.as_str()).collect()
    }

    /// Establish one watcher per notification-capable source.
    ///
    /// A source that cannot be reached or refuses the subscription is logged
    /// and left without a watcher for the rest of the process; the timer
    /// still covers it.
    pub async fn start_watchers(&mut self) {
        let refresher = Arc::clone(&self.refresher);
        let connector = refresher.connector();
        let timeout = refresher.source_timeout();
        for config in refresher.sources() {
            let connector = Arc::clone(&connector);
            let tx = self.signal_tx.clone();
            let setup = async move {
                let handle = connector.acquire(config).await?;
                handle.watch(tx).await
            };
            let result = tokio::time::timeout(timeout, setup)
                .await
                .unwrap_or_else(|_| {
                    Err(SourceError::Timeout {
                        source_name: config.name.clone(),
                        elapsed: timeout,
                    })
                });
            match result {
                Ok(Some(task)) => {
                    tracing::info!(
                        source = %config.name,
                        kind = %config.kind(),
                        "change watcher started"
                    );
                    self.watchers.push(Watcher {
                        source: config.name.clone(),
                        task,
                    });
                }
                Ok(None) => {
                    tracing::debug!(
                        source = %config.name,
                        kind = %config.kind(),
                        "no change notifications, timer only"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        source = %config.name,
                        error = %e,
                        "change watcher unavailable, timer only"
                    );
                }
            }
        }
    }

    /// Main loop. Runs until the cancellation token fires, then stops the
    /// watchers and waits for in-flight refreshes.
    pub async fn run(&mut self) {
        let mut timer = tokio::time::interval(self.poll_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            sources = self.refresher.sources().len(),
            watchers = self.watchers.len(),
            "multiplexer started"
        );

        loop {
            tokio::select! {
                _ = timer.tick() => self.dispatch(Trigger::Timer),
                signal = self.signal_rx.recv() => {
                    // The multiplexer holds a sender, so the queue never closes.
                    if let Some(signal) = signal {
                        self.dispatch(Trigger::Watch(signal));
                    }
                }
                _ = self.cancel.cancelled() => {
                    tracing::info!("multiplexer: cancellation requested, shutting down");
                    break;
                }
            }
        }

        self.shutdown().await;
    }

    /// Spawn an independent refresh for `trigger`.
    pub fn dispatch(&self, trigger: Trigger) {
        if let Trigger::Watch(ref signal) = trigger {
            tracing::debug!(source = %signal.source, target = ?signal.target, "change signal");
        }
        let refresher = Arc::clone(&self.refresher);
        let broadcaster = Arc::clone(&self.broadcaster);
        self.refreshes
            .spawn(refresh_and_publish(refresher, broadcaster, trigger));
    }

    async fn shutdown(&mut self) {
        for watcher in self.watchers.drain(..) {
            tracing::debug!(source = %watcher.source, "stopping change watcher");
            watcher.task.abort();
        }
        self.refreshes.close();
        self.refreshes.wait().await;
    }
}

/// Refresh all sources, publish the snapshot, then the trigger's edge event.
pub async fn refresh_and_publish(
    refresher: Arc<Refresher>,
    broadcaster: Arc<Broadcaster>,
    trigger: Trigger,
) {
    let diagrams = refresher.refresh().await;
    broadcaster.publish_snapshot(diagrams).await;

    if let Trigger::Watch(signal) = trigger {
        match signal.target {
            Some(target) => broadcaster.publish_edge(change_event(&signal.source, &target)),
            None => {
                tracing::debug!(source = %signal.source, "signal without target, snapshot only");
            }
        }
    }
}
