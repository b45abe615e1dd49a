use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SchemaError;
use crate::graph::Graph;

// ─── Sources ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum SourceKind {
    Sqlite,
    Postgres,
    Redis,
}

impl SourceKind {
    pub const ALL: [Self; 3] = [Self::Sqlite, Self::Postgres, Self::Redis];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
            Self::Redis => "redis",
        }
    }

    /// Relational stores produce table diagrams, key-value stores produce
    /// agent namespace diagrams.
    pub fn family(self) -> StoreFamily {
        match self {
            Self::Sqlite | Self::Postgres => StoreFamily::Relational,
            Self::Redis => StoreFamily::KeyValue,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "redis" => Ok(Self::Redis),
            _ => Err(SchemaError::InvalidConfig(format!("unknown source kind: {s}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreFamily {
    Relational,
    KeyValue,
}

pub const DEFAULT_PG_SCHEMA: &str = "public";
pub const DEFAULT_PG_CHANNEL: &str = "table_update";

/// Kind-specific connection parameters, tagged by `kind` in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Connection {
    Sqlite {
        path: String,
    },
    Postgres {
        url: String,
        #[serde(default)]
        schema: Option<String>,
        #[serde(default)]
        channel: Option<String>,
    },
    Redis {
        url: String,
        #[serde(default)]
        db: Option<u32>,
    },
}

/// Immutable descriptor of one configured data store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    #[serde(flatten)]
    pub connection: Connection,
}

impl SourceConfig {
    pub fn kind(&self) -> SourceKind {
        match self.connection {
            Connection::Sqlite { .. } => SourceKind::Sqlite,
            Connection::Postgres { .. } => SourceKind::Postgres,
            Connection::Redis { .. } => SourceKind::Redis,
        }
    }
}

// ─── Structural entities ──────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: String,
}

/// A table with its columns in storage-catalog order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueKind {
    Scalar,
    List,
    Set,
    OrderedSet,
    Mapping,
    Other,
}

impl ValueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scalar => "scalar",
            Self::List => "list",
            Self::Set => "set",
            Self::OrderedSet => "ordered-set",
            Self::Mapping => "mapping",
            Self::Other => "other",
        }
    }

    /// Map a redis `TYPE` reply onto a value kind.
    pub fn from_redis_type(reply: &str) -> Self {
        match reply {
            "string" => Self::Scalar,
            "list" => Self::List,
            "set" => Self::Set,
            "zset" => Self::OrderedSet,
            "hash" => Self::Mapping,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One retained key of an agent namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEntry {
    pub full_key: String,
    pub subkey: String,
    pub kind: ValueKind,
    /// Field names, populated only for `Mapping` values.
    #[serde(default)]
    pub fields: Vec<String>,
}

/// Keys sharing the same agent prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    pub agent: String,
    pub keys: Vec<KeyEntry>,
}

/// One introspected unit of a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StructuralEntity {
    Table(Table),
    Namespace(Namespace),
}

impl StructuralEntity {
    pub fn name(&self) -> &str {
        match self {
            Self::Table(t) => &t.name,
            Self::Namespace(ns) => &ns.agent,
        }
    }
}

// ─── Diagrams ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeClass {
    Small,
    Large,
}

impl SizeClass {
    pub fn classify(rendered_len: usize, threshold: usize) -> Self {
        if rendered_len > threshold {
            Self::Large
        } else {
            Self::Small
        }
    }
}

/// One rendered graph describing one entity.
///
/// Serializes to the wire shape `{name, diagram, size}`; the structured graph
/// stays in memory only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagram {
    pub name: String,
    #[serde(skip)]
    pub graph: Graph,
    pub diagram: String,
    pub size: SizeClass,
}

/// `"<source>/<entity>"`
pub fn diagram_name(source: &str, entity: &str) -> String {
    format!("{source}/{entity}")
}

// ─── Change signals ───────────────────────────────────────────────

/// Entity and sub-entity implicated by a backend change notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeTarget {
    pub entity: String,
    pub sub_entity: String,
}

/// A normalized signal from a change watcher.
///
/// `target` is `None` when the raw notification could not be mapped onto an
/// entity; the signal still triggers a refresh but yields no edge event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSignal {
    pub source: String,
    pub target: Option<ChangeTarget>,
}

/// One edge implicated by a detected change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub name: String,
    pub from: String,
    pub to: String,
}
