//! Content-type-driven parsing of submission bodies into a flat
//! key/value payload.
//!
//! JSON objects pass through as-is. Form-encoded and multipart bodies
//! flatten into a map where repeated keys collapse into an array value.
//! Anything else is attempted as JSON, falling back to wrapping the raw
//! text in a single `_raw` field.

use crate::errors::IngestError;
use serde_json::{Map, Value};

pub const RAW_FIELD: &str = "_raw";

/// Inserts a value under `key`, collapsing repeated keys into an array.
pub fn insert_flat(map: &mut Map<String, Value>, key: &str, value: Value) {
    match map.get_mut(key) {
        None => {
            map.insert(key.to_string(), value);
        }
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
    }
}

/// Parses a non-multipart body according to its content type.
pub fn parse_bytes(
    content_type: Option<&str>,
    bytes: &[u8],
) -> Result<Map<String, Value>, IngestError> {
    let media_type = content_type
        .map(|c| c.split(';').next().unwrap_or(c).trim().to_ascii_lowercase())
        .unwrap_or_default();

    match media_type.as_str() {
        "application/json" => parse_json(bytes),
        "application/x-www-form-urlencoded" => Ok(parse_form_urlencoded(bytes)),
        _ => {
            // Unknown or missing content type: try JSON first, then wrap
            // the raw text so the submission is never lost.
            if let Ok(map) = parse_json(bytes) {
                return Ok(map);
            }
            let text = String::from_utf8_lossy(bytes).into_owned();
            let mut map = Map::new();
            map.insert(RAW_FIELD.to_string(), Value::String(text));
            Ok(map)
        }
    }
}

fn parse_json(bytes: &[u8]) -> Result<Map<String, Value>, IngestError> {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(IngestError::MalformedBody(
            "JSON body must be an object".to_string(),
        )),
        Err(e) => Err(IngestError::MalformedBody(e.to_string())),
    }
}

fn parse_form_urlencoded(bytes: &[u8]) -> Map<String, Value> {
    let mut map = Map::new();
    for (key, value) in url::form_urlencoded::parse(bytes) {
        insert_flat(&mut map, &key, Value::String(value.into_owned()));
    }
    map
}
