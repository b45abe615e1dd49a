//! Parsing of relational change-notification payloads.
//!
//! Triggers are expected to publish `"<table>:<column>"` on the change channel.

use crate::error::SchemaError;
use crate::types::ChangeTarget;

pub const PAYLOAD_SEPARATOR: char = ':';

pub fn parse_notify_payload(payload: &str) -> Result<ChangeTarget, SchemaError> {
    let malformed = |detail: &str| SchemaError::MalformedPayload {
        payload: payload.to_string(),
        detail: detail.to_string(),
    };

    let (entity, sub_entity) = payload
        .trim()
        .split_once(PAYLOAD_SEPARATOR)
        .ok_or_else(|| malformed("missing ':' separator"))?;
    if entity.is_empty() {
        return Err(malformed("empty table name"));
    }
    if sub_entity.is_empty() {
        return Err(malformed("empty column name"));
    }
    Ok(ChangeTarget {
        entity: entity.to_string(),
        sub_entity: sub_entity.to_string(),
    })
}
