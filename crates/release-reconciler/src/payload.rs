// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Values payload parsing.
//!
//! The raw payload string is what the fingerprint store compares; the parsed
//! mapping is only handed to the release backend.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Parsed release values: string keys to arbitrary values.
pub type Values = Map<String, Value>;

/// Errors from parsing a values payload.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// Payload is not valid YAML, or a merge key does not point at a mapping.
    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Payload has keys or values JSON cannot carry (e.g. float keys).
    #[error("Values not representable as JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Payload parsed, but its top level is not a mapping.
    #[error("Expected a mapping at the top level, found {0}")]
    NotAMapping(&'static str),
}

/// Parse a raw payload into release values.
///
/// Empty documents and an explicit `null` parse to an empty mapping.
/// Merge keys (`<<: *anchor`) are resolved before conversion.
pub fn parse_values(raw: &str) -> Result<Values, PayloadError> {
    if raw.trim().is_empty() {
        return Ok(Values::new());
    }
    let mut document: serde_yaml::Value = serde_yaml::from_str(raw)?;
    document.apply_merge()?;
    match serde_json::to_value(document)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Values::new()),
        Value::Array(_) => Err(PayloadError::NotAMapping("a sequence")),
        Value::String(_) => Err(PayloadError::NotAMapping("a string")),
        Value::Number(_) => Err(PayloadError::NotAMapping("a number")),
        Value::Bool(_) => Err(PayloadError::NotAMapping("a boolean")),
    }
}

/// Short SHA-256 digest identifying a payload in log lines.
pub fn digest(raw: &str) -> String {
    let hash = Sha256::digest(raw.as_bytes());
    let hex = format!("{:x}", hash);
    hex[..12].to_string()
}
