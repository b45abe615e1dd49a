//! schemascope-core: backend-agnostic schema graph model.
//! Source configuration, structural entities, node identifiers, the diagram
//! graph and its builder, and change-signal parsing. No IO and no async.

pub mod builder;
pub mod config;
pub mod error;
pub mod graph;
pub mod keyspace;
pub mod node_id;
pub mod notify;
pub mod types;

pub use builder::{DEFAULT_SIZE_THRESHOLD, DiagramBuilder, change_event};
pub use config::{SourcesFile, parse_sources};
pub use error::SchemaError;
pub use graph::{Edge, Graph, Node};
pub use keyspace::{KeyPartition, partition_key};
pub use node_id::NodeId;
pub use notify::parse_notify_payload;
pub use types::*;
