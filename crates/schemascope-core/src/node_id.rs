//! Deterministic, collision-free node identifiers.
//!
//! A `NodeId` is the path `source / entity / [sub-entity / ...]` joined with
//! `SEPARATOR`. Each segment is escaped first so that it contains only ASCII
//! alphanumerics and `ESCAPE`; since no escaped segment contains the separator,
//! splitting on it recovers the segments exactly and distinct paths never map
//! to the same id. The output is also a valid Mermaid node identifier.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const SEPARATOR: char = '_';
const ESCAPE: char = 'Z';

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn from_segments<S: AsRef<str>>(segments: &[S]) -> Self {
        let mut id = String::new();
        for (i, segment) in segments.iter().enumerate() {
            if i > 0 {
                id.push(SEPARATOR);
            }
            escape_segment(segment.as_ref(), &mut id);
        }
        Self(id)
    }

    /// Root node of an entity: `source / entity`.
    pub fn entity(source: &str, entity: &str) -> Self {
        Self::from_segments(&[source, entity])
    }

    /// Child of an entity: `source / entity / sub_entity`.
    pub fn member(source: &str, entity: &str, sub_entity: &str) -> Self {
        Self::from_segments(&[source, entity, sub_entity])
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Alphanumerics other than `ESCAPE` pass through; every other char becomes
/// `Z<hex codepoint>Z`.
fn escape_segment(segment: &str, out: &mut String) {
    for c in segment.chars() {
        if c.is_ascii_alphanumeric() && c != ESCAPE {
            out.push(c);
        } else {
            out.push(ESCAPE);
            out.push_str(&format!("{:x}", c as u32));
            out.push(ESCAPE);
        }
    }
}
