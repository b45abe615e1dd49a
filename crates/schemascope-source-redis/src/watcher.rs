//! Keyspace-notification change watcher.
//!
//! Enables `notify-keyspace-events`, pattern-subscribes to the keyevent
//! channels of the configured database and turns every event's key into a
//! `ChangeSignal`.

use futures_util::StreamExt;
use redis::Client;
use redis::aio::PubSub;
use schemascope_core::{ChangeSignal, ChangeTarget, partition_key};
use tokio::sync::mpsc;

use crate::error::RedisSourceError;

/// K: keyspace, E: keyevent, A: all command classes.
const NOTIFY_FLAGS: &str = "KEA";

pub fn keyevent_pattern(db: i64) -> String {
    format!("__keyevent@{db}__:*")
}

/// Enable notifications and subscribe to all keyevent channels.
///
/// A refused `CONFIG SET` (managed instances often disable it) is logged and
/// the subscription is still attempted; notifications may already be enabled
/// server-side.
pub async fn subscribe_keyspace(
    client: &Client,
    source: &str,
) -> Result<PubSub, RedisSourceError> {
    let mut con = client
        .get_multiplexed_async_connection()
        .await
        .map_err(RedisSourceError::Connect)?;
    let configured: Result<(), redis::RedisError> = redis::cmd("CONFIG")
        .arg("SET")
        .arg("notify-keyspace-events")
        .arg(NOTIFY_FLAGS)
        .query_async(&mut con)
        .await;
    if let Err(e) = configured {
        tracing::warn!(source, error = %e, "could not enable keyspace notifications");
    }

    let mut pubsub = client
        .get_async_pubsub()
        .await
        .map_err(RedisSourceError::Connect)?;
    let pattern = keyevent_pattern(client.get_connection_info().redis.db);
    pubsub.psubscribe(&pattern).await?;
    tracing::debug!(source, pattern = %pattern, "subscribed to keyevent channels");
    Ok(pubsub)
}

/// Map a changed key to a signal. Keys outside an agent namespace yield a
/// signal without target: the refresh happens, the edge event does not.
pub fn signal_from_key(source: &str, key: &str) -> ChangeSignal {
    let target = match partition_key(key) {
        Ok(part) => Some(ChangeTarget {
            entity: part.agent.to_string(),
            sub_entity: part.subkey.to_string(),
        }),
        Err(e) => {
            tracing::info!(source, error = %e, "no edge event for key");
            None
        }
    };
    ChangeSignal {
        source: source.to_string(),
        target,
    }
}

/// Map a raw keyevent payload to a signal. A key that is not UTF-8 still
/// triggers the refresh, without target.
pub fn signal_from_payload(source: &str, payload: &[u8]) -> ChangeSignal {
    match std::str::from_utf8(payload) {
        Ok(key) => signal_from_key(source, key),
        Err(e) => {
            tracing::warn!(source, error = %e, "no edge event for non-UTF-8 key");
            ChangeSignal {
                source: source.to_string(),
                target: None,
            }
        }
    }
}

/// Forward keyevent messages until the subscription ends or the receiver is
/// gone.
pub async fn forward_keyspace_events(
    pubsub: PubSub,
    source: String,
    tx: mpsc::Sender<ChangeSignal>,
) {
    let mut messages = pubsub.into_on_message();
    while let Some(msg) = messages.next().await {
        tracing::debug!(
            source = %source,
            channel = msg.get_channel_name(),
            key = %String::from_utf8_lossy(msg.get_payload_bytes()),
            "keyevent"
        );
        let signal = signal_from_payload(&source, msg.get_payload_bytes());
        if tx.send(signal).await.is_err() {
            tracing::debug!(source = %source, "signal queue closed, stopping watcher");
            return;
        }
    }
    tracing::warn!(source = %source, "redis keyevent subscription ended");
}
