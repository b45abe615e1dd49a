//! Key enumeration and agent namespace listing.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, IntoConnectionInfo};
use schemascope_core::keyspace::group_keys;
use schemascope_core::{KeyEntry, Namespace, StructuralEntity, ValueKind};

use crate::error::RedisSourceError;

/// Keys requested per `SCAN` round trip.
const SCAN_COUNT: usize = 500;

/// `SCAN` reply: next cursor and a batch of raw keys. Redis keys are
/// binary-safe, so they are decoded one by one afterwards.
type ScanReply = (u64, Vec<Vec<u8>>);

/// Keyspace queries the adapter needs. Enables mock injection for testing.
#[async_trait]
pub trait KeyspaceCatalog: Send {
    /// Every key of the database, undecoded, in server order.
    async fn scan_keys(&mut self) -> Result<Vec<Vec<u8>>, RedisSourceError>;
    /// Raw `TYPE` reply for `key`.
    async fn key_type(&mut self, key: &str) -> Result<String, RedisSourceError>;
    async fn hash_fields(&mut self, key: &str) -> Result<Vec<String>, RedisSourceError>;
}

#[async_trait]
impl KeyspaceCatalog for ConnectionManager {
    async fn scan_keys(&mut self) -> Result<Vec<Vec<u8>>, RedisSourceError> {
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): ScanReply = redis::cmd("SCAN")
                .arg(cursor)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(self)
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        Ok(keys)
    }

    async fn key_type(&mut self, key: &str) -> Result<String, RedisSourceError> {
        let reply: String = redis::cmd("TYPE").arg(key).query_async(self).await?;
        Ok(reply)
    }

    async fn hash_fields(&mut self, key: &str) -> Result<Vec<String>, RedisSourceError> {
        // Field names only label nodes, a lossy decode is enough.
        let raw: Vec<Vec<u8>> = redis::cmd("HKEYS").arg(key).query_async(self).await?;
        Ok(raw
            .iter()
            .map(|field| String::from_utf8_lossy(field).into_owned())
            .collect())
    }
}

/// Build a client for `url`, overriding the logical database when `db` is set.
pub fn client(url: &str, db: Option<u32>) -> Result<Client, RedisSourceError> {
    let mut info = url
        .into_connection_info()
        .map_err(RedisSourceError::InvalidUrl)?;
    if let Some(db) = db {
        info.redis.db = i64::from(db);
    }
    Client::open(info).map_err(RedisSourceError::InvalidUrl)
}

/// Reconnecting connection, cheap to clone and safe to keep across refreshes.
pub async fn connect(client: &Client) -> Result<ConnectionManager, RedisSourceError> {
    client
        .get_connection_manager()
        .await
        .map_err(RedisSourceError::Connect)
}

/// Decode raw keys, sorted and deduplicated.
///
/// SCAN order follows the hash table layout and may repeat keys; sorting
/// keeps consecutive snapshots of an unchanged keyspace identical. A key that
/// is not UTF-8 cannot be named in a diagram and is skipped with a warning.
fn decode_keys(raw: Vec<Vec<u8>>) -> Vec<String> {
    let mut keys: Vec<String> = raw
        .into_iter()
        .filter_map(|bytes| match String::from_utf8(bytes) {
            Ok(key) => Some(key),
            Err(e) => {
                let lossy = String::from_utf8_lossy(e.as_bytes()).into_owned();
                tracing::warn!(key = %lossy, "skipping key: not valid UTF-8");
                None
            }
        })
        .collect();
    keys.sort();
    keys.dedup();
    keys
}

async fn describe_key<C: KeyspaceCatalog + ?Sized>(
    catalog: &mut C,
    full_key: String,
    subkey: String,
) -> Result<KeyEntry, RedisSourceError> {
    let kind = ValueKind::from_redis_type(&catalog.key_type(&full_key).await?);
    let fields = if kind == ValueKind::Mapping {
        catalog.hash_fields(&full_key).await?
    } else {
        Vec::new()
    };
    Ok(KeyEntry {
        full_key,
        subkey,
        kind,
        fields,
    })
}

/// List agent namespaces with the kind (and, for hashes, field names) of each
/// retained key.
///
/// Failing to enumerate keys fails the source. A key whose `TYPE`/`HKEYS`
/// fails is skipped with a warning; an agent left without keys is dropped.
pub async fn introspect<C: KeyspaceCatalog + ?Sized>(
    catalog: &mut C,
) -> Result<Vec<StructuralEntity>, RedisSourceError> {
    let keys = decode_keys(catalog.scan_keys().await?);
    let groups = group_keys(keys.iter().map(String::as_str));

    let mut entities = Vec::with_capacity(groups.len());
    for (agent, members) in groups {
        let mut entries = Vec::with_capacity(members.len());
        for (full_key, subkey) in members {
            match describe_key(catalog, full_key.clone(), subkey).await {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    tracing::warn!(
                        key = %full_key,
                        error = %e,
                        "skipping key: type lookup failed"
                    );
                }
            }
        }
        if !entries.is_empty() {
            entities.push(StructuralEntity::Namespace(Namespace {
                agent,
                keys: entries,
            }));
        }
    }
    Ok(entities)
}
