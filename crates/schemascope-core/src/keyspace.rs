//! Agent namespace partitioning for key-value stores.
//!
//! A key `agent:rest` belongs to agent `agent` with subkey `rest` (which may
//! itself contain separators). Keys without a separator, with an empty
//! remainder, or whose remainder equals the agent are not grouped: they would
//! produce a childless or self-referential node.

use std::collections::BTreeMap;

use crate::error::SchemaError;

pub const NAMESPACE_SEPARATOR: char = ':';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPartition<'a> {
    pub agent: &'a str,
    pub subkey: &'a str,
}

pub fn partition_key(key: &str) -> Result<KeyPartition<'_>, SchemaError> {
    let (agent, subkey) = key
        .split_once(NAMESPACE_SEPARATOR)
        .ok_or_else(|| SchemaError::UngroupedKey(key.to_string()))?;
    if subkey.is_empty() || subkey == agent {
        return Err(SchemaError::UngroupedKey(key.to_string()));
    }
    Ok(KeyPartition { agent, subkey })
}

/// Group keys by agent, dropping keys that fail `partition_key`.
///
/// Agents are ordered by first appearance in `keys`; within an agent, keys
/// keep their input order. The return value pairs each agent with
/// `(full_key, subkey)` tuples.
pub fn group_keys<'a, I>(keys: I) -> Vec<(String, Vec<(String, String)>)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut order: Vec<String> = Vec::new();
    let mut groups: BTreeMap<String, Vec<(String, String)>> = BTreeMap::new();
    for key in keys {
        let Ok(part) = partition_key(key) else {
            continue;
        };
        let entry = groups.entry(part.agent.to_string()).or_insert_with(|| {
            order.push(part.agent.to_string());
            Vec::new()
        });
        entry.push((key.to_string(), part.subkey.to_string()));
    }
    order
        .into_iter()
        .filter_map(|agent| groups.remove(&agent).map(|keys| (agent, keys)))
        .collect()
}
