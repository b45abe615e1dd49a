//! Error types for the schema model.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("invalid source config: {0}")]
    InvalidConfig(String),

    #[error("malformed notify payload {payload:?}: {detail}")]
    MalformedPayload { payload: String, detail: String },

    #[error("key {0:?} does not belong to an agent namespace")]
    UngroupedKey(String),
}
