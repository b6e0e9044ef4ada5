//! On-disk representation of a collection.
//!
//! A collection file holds a single top-level JSON array of documents.
//! Temporal fields are normalized to canonical UTC form before encoding so
//! files written by this store always carry one timestamp format.

use serde_json::Value;

use crate::clock::{format_timestamp, parse_timestamp};
use crate::document::{Document, CREATED_AT, UPDATED_AT};
use crate::error::{StoreError, StoreResult};

/// Fields holding RFC 3339 timestamps.
pub const TEMPORAL_FIELDS: &[&str] = &[CREATED_AT, UPDATED_AT];

/// Encode a collection for writing.
pub fn encode(documents: &[Document], pretty: bool) -> StoreResult<Vec<u8>> {
    let mut bytes = if pretty {
        serde_json::to_vec_pretty(documents)
    } else {
        serde_json::to_vec(documents)
    }
    .map_err(|e| StoreError::Codec(e.to_string()))?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Decode a collection file.
///
/// Whitespace-only input is an empty collection. Anything other than an
/// array of objects is an error.
pub fn decode(bytes: &[u8]) -> Result<Vec<Document>, serde_json::Error> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    serde_json::from_slice(bytes)
}

/// Rewrite parseable temporal fields in canonical UTC microsecond form.
///
/// Values that are not RFC 3339 strings are left untouched.
pub fn normalize_temporal(document: &mut Document) {
    for field in TEMPORAL_FIELDS {
        let normalized = match document.get(field) {
            Some(Value::String(raw)) => match parse_timestamp(raw) {
                Some(ts) => format_timestamp(&ts),
                None => continue,
            },
            _ => continue,
        };
        document.insert(*field, Value::String(normalized));
    }
}
