//! LISTEN/NOTIFY change watcher.
//!
//! Database triggers are expected to `NOTIFY <channel>, '<table>:<column>'`.

use schemascope_core::{ChangeSignal, parse_notify_payload};
use sqlx::postgres::PgListener;
use tokio::sync::mpsc;

use crate::error::PostgresSourceError;

/// Open a dedicated connection and `LISTEN` on `channel`.
pub async fn listen(url: &str, channel: &str) -> Result<PgListener, PostgresSourceError> {
    let mut listener = PgListener::connect(url)
        .await
        .map_err(PostgresSourceError::Connect)?;
    listener
        .listen(channel)
        .await
        .map_err(|source| PostgresSourceError::Listen {
            channel: channel.to_string(),
            source,
        })?;
    Ok(listener)
}

/// Map a notification payload to a signal. Malformed payloads still produce a
/// signal (the refresh is not suppressed) but without a target.
pub fn signal_from_payload(source: &str, payload: &str) -> ChangeSignal {
    let target = match parse_notify_payload(payload) {
        Ok(target) => Some(target),
        Err(e) => {
            tracing::warn!(source, error = %e, "dropping edge event for malformed notification");
            None
        }
    };
    ChangeSignal {
        source: source.to_string(),
        target,
    }
}

/// Forward notifications until the connection fails or the receiver is gone.
pub async fn forward_notifications(
    mut listener: PgListener,
    source: String,
    tx: mpsc::Sender<ChangeSignal>,
) {
    loop {
        let notification = match listener.recv().await {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(source = %source, error = %e, "postgres listener stopped");
                return;
            }
        };
        tracing::debug!(
            source = %source,
            channel = notification.channel(),
            payload = notification.payload(),
            "postgres notification"
        );
        let signal = signal_from_payload(&source, notification.payload());
        if tx.send(signal).await.is_err() {
            tracing::debug!(source = %source, "signal queue closed, stopping listener");
            return;
        }
    }
}
