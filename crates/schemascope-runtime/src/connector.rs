//! Real `Connector`: SQLite files, PostgreSQL pools and Redis clients.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use redis::Client as RedisClient;
use redis::aio::ConnectionManager;
use rusqlite::Connection as SqliteConnection;
use schemascope_core::{
    ChangeSignal, Connection, DEFAULT_PG_CHANNEL, DEFAULT_PG_SCHEMA, SourceConfig,
    StructuralEntity,
};
use sqlx::PgPool;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use crate::source::{Connector, SourceError, SourceHandle};

/// Established connections keyed by source name.
///
/// The lock is never held across a connect, so a slow server cannot block
/// other sources. When two acquires race, the first stored value wins.
struct ConnectionCache<T> {
    entries: Mutex<HashMap<String, T>>,
}

impl<T: Clone> ConnectionCache<T> {
    fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    async fn get(&self, name: &str) -> Option<T> {
        self.entries.lock().await.get(name).cloned()
    }

    async fn insert(&self, name: &str, value: T) -> T {
        let mut entries = self.entries.lock().await;
        entries.entry(name.to_string()).or_insert(value).clone()
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[derive(Clone)]
struct RedisConnection {
    client: RedisClient,
    con: ConnectionManager,
}

/// Connects to configured stores on demand.
///
/// SQLite files are reopened per acquire. PostgreSQL pools and Redis
/// connection managers are cached by source name and reconnect on their own.
pub struct StoreConnector {
    connect_timeout: Duration,
    pg_pools: ConnectionCache<PgPool>,
    redis: ConnectionCache<RedisConnection>,
}

impl StoreConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            pg_pools: ConnectionCache::new(),
            redis: ConnectionCache::new(),
        }
    }

    async fn pg_pool(&self, name: &str, url: &str) -> Result<PgPool, SourceError> {
        if let Some(pool) = self.pg_pools.get(name).await {
            return Ok(pool);
        }
        let pool = schemascope_source_postgres::connect(url, self.connect_timeout)
            .await
            .map_err(|e| SourceError::unavailable(name, e))?;
        Ok(self.pg_pools.insert(name, pool).await)
    }

    async fn redis_connection(
        &self,
        name: &str,
        url: &str,
        db: Option<u32>,
    ) -> Result<RedisConnection, SourceError> {
        if let Some(conn) = self.redis.get(name).await {
            return Ok(conn);
        }
        let client = schemascope_source_redis::client(url, db)
            .map_err(|e| SourceError::unavailable(name, e))?;
        let con = schemascope_source_redis::connect(&client)
            .await
            .map_err(|e| SourceError::unavailable(name, e))?;
        Ok(self.redis.insert(name, RedisConnection { client, con }).await)
    }
}

#[async_trait]
impl Connector for StoreConnector {
    async fn acquire(&self, config: &SourceConfig) -> Result<Box<dyn SourceHandle>, SourceError> {
        let name = config.name.clone();
        match &config.connection {
            Connection::Sqlite { path } => {
                let path = path.clone();
                let conn = tokio::task::spawn_blocking(move || {
                    schemascope_source_sqlite::open_read_only(&path)
                })
                .await
                .map_err(|e| SourceError::unavailable(&name, e))?
                .map_err(|e| SourceError::unavailable(&name, e))?;
                Ok(Box::new(SqliteHandle {
                    name,
                    conn: Arc::new(StdMutex::new(conn)),
                }))
            }
            Connection::Postgres {
                url,
                schema,
                channel,
            } => {
                let pool = self.pg_pool(&name, url).await?;
                Ok(Box::new(PostgresHandle {
                    name,
                    url: url.clone(),
                    pool,
                    schema: schema.clone().unwrap_or_else(|| DEFAULT_PG_SCHEMA.to_string()),
                    channel: channel
                        .clone()
                        .unwrap_or_else(|| DEFAULT_PG_CHANNEL.to_string()),
                }))
            }
            Connection::Redis { url, db } => {
                let RedisConnection { client, con } =
                    self.redis_connection(&name, url, *db).await?;
                Ok(Box::new(RedisHandle { name, client, con }))
            }
        }
    }
}

// ─── SQLite ───────────────────────────────────────────────────────

struct SqliteHandle {
    name: String,
    conn: Arc<StdMutex<SqliteConnection>>,
}

#[async_trait]
impl SourceHandle for SqliteHandle {
    async fn introspect(&self) -> Result<Vec<StructuralEntity>, SourceError> {
        let conn = Arc::clone(&self.conn);
        let name = self.name.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| SourceError::introspection(&name, "connection mutex poisoned"))?;
            schemascope_source_sqlite::introspect(&*conn)
                .map_err(|e| SourceError::introspection(&name, e))
        })
        .await
        .map_err(|e| SourceError::introspection(&self.name, e))?
    }

    async fn watch(
        &self,
        _tx: mpsc::Sender<ChangeSignal>,
    ) -> Result<Option<JoinHandle<()>>, SourceError> {
        Ok(None)
    }
}

// ─── PostgreSQL ───────────────────────────────────────────────────

struct PostgresHandle {
    name: String,
    url: String,
    pool: PgPool,
    schema: String,
    channel: String,
}

#[async_trait]
impl SourceHandle for PostgresHandle {
    async fn introspect(&self) -> Result<Vec<StructuralEntity>, SourceError> {
        schemascope_source_postgres::introspect(&self.pool, &self.schema)
            .await
            .map_err(|e| SourceError::introspection(&self.name, e))
    }

    async fn watch(
        &self,
        tx: mpsc::Sender<ChangeSignal>,
    ) -> Result<Option<JoinHandle<()>>, SourceError> {
        let listener = schemascope_source_postgres::listen(&self.url, &self.channel)
            .await
            .map_err(|e| SourceError::watch(&self.name, e))?;
        tracing::info!(
            source = %self.name,
            channel = %self.channel,
            "postgres listener established"
        );
        let task = tokio::spawn(schemascope_source_postgres::forward_notifications(
            listener,
            self.name.clone(),
            tx,
        ));
        Ok(Some(task))
    }
}

// ─── Redis ────────────────────────────────────────────────────────

struct RedisHandle {
    name: String,
    client: RedisClient,
    con: ConnectionManager,
}

#[async_trait]
impl SourceHandle for RedisHandle {
    async fn introspect(&self) -> Result<Vec<StructuralEntity>, SourceError> {
        let mut con = self.con.clone();
        schemascope_source_redis::introspect(&mut con)
            .await
            .map_err(|e| SourceError::introspection(&self.name, e))
    }

    async fn watch(
        &self,
        tx: mpsc::Sender<ChangeSignal>,
    ) -> Result<Option<JoinHandle<()>>, SourceError> {
        let pubsub = schemascope_source_redis::subscribe_keyspace(&self.client, &self.name)
            .await
            .map_err(|e| SourceError::watch(&self.name, e))?;
        tracing::info!(source = %self.name, "redis keyspace listener established");
        let task = tokio::spawn(schemascope_source_redis::forward_keyspace_events(
            pubsub,
            self.name.clone(),
            tx,
        ));
        Ok(Some(task))
    }
}
