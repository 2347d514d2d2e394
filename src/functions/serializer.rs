//! JSON codec for callable payloads.
//!
//! Integers that cannot be represented exactly by an IEEE double are carried as
//! protobuf wrapper objects so callers on every platform read the same value.

use serde::Serialize;
use serde_json::{Map, Number, Value as JsonValue};

use crate::functions::error::{internal_error, FunctionsResult};

const TYPE_KEY: &str = "@type";
const LONG_TYPE: &str = "type.googleapis.com/google.protobuf.Int64Value";
const UNSIGNED_LONG_TYPE: &str = "type.googleapis.com/google.protobuf.UInt64Value";

/// Largest integer magnitude a double holds without loss (2^53 - 1).
const MAX_SAFE_INTEGER: i64 = 9_007_199_254_740_991;

/// Serializes `data` and wraps integers outside the safe range.
pub fn encode<T: Serialize + ?Sized>(data: &T) -> FunctionsResult<JsonValue> {
    let value = serde_json::to_value(data)
        .map_err(|err| internal_error(format!("Failed to serialize callable payload: {err}")))?;
    Ok(encode_value(value))
}

fn encode_value(value: JsonValue) -> JsonValue {
    match value {
        JsonValue::Number(number) => encode_number(number),
        JsonValue::Array(items) => JsonValue::Array(items.into_iter().map(encode_value).collect()),
        JsonValue::Object(map) => JsonValue::Object(
            map.into_iter()
                .map(|(key, value)| (key, encode_value(value)))
                .collect(),
        ),
        other => other,
    }
}

fn encode_number(number: Number) -> JsonValue {
    if let Some(value) = number.as_i64() {
        if !(-MAX_SAFE_INTEGER..=MAX_SAFE_INTEGER).contains(&value) {
            return wrapped(LONG_TYPE, value.to_string());
        }
    } else if let Some(value) = number.as_u64() {
        return wrapped(UNSIGNED_LONG_TYPE, value.to_string());
    }
    JsonValue::Number(number)
}

fn wrapped(type_url: &str, value: String) -> JsonValue {
    let mut map = Map::new();
    map.insert(TYPE_KEY.to_string(), JsonValue::String(type_url.to_string()));
    map.insert("value".to_string(), JsonValue::String(value));
    JsonValue::Object(map)
}

/// Reverses [`encode`], unwrapping 64-bit integer wrappers.
///
/// Objects tagged with any other `@type` are rejected.
pub fn decode(value: &JsonValue) -> FunctionsResult<JsonValue> {
    match value {
        JsonValue::Array(items) => items
            .iter()
            .map(decode)
            .collect::<FunctionsResult<Vec<_>>>()
            .map(JsonValue::Array),
        JsonValue::Object(map) => {
            if let Some(type_url) = map.get(TYPE_KEY) {
                return decode_wrapped(type_url, map.get("value"));
            }
            let mut decoded = Map::with_capacity(map.len());
            for (key, value) in map {
                decoded.insert(key.clone(), decode(value)?);
            }
            Ok(JsonValue::Object(decoded))
        }
        other => Ok(other.clone()),
    }
}

fn decode_wrapped(type_url: &JsonValue, value: Option<&JsonValue>) -> FunctionsResult<JsonValue> {
    let type_url = type_url.as_str().unwrap_or_default();
    let raw = value.and_then(JsonValue::as_str);
    match type_url {
        LONG_TYPE => raw
            .and_then(|raw| raw.parse::<i64>().ok())
            .map(|value| JsonValue::Number(value.into()))
            .ok_or_else(|| internal_error(format!("Data cannot be decoded from JSON: {type_url}"))),
        UNSIGNED_LONG_TYPE => raw
            .and_then(|raw| raw.parse::<u64>().ok())
            .map(|value| JsonValue::Number(value.into()))
            .ok_or_else(|| internal_error(format!("Data cannot be decoded from JSON: {type_url}"))),
        _ => Err(internal_error(format!(
            "Data cannot be decoded from JSON: unknown type {type_url}"
        ))),
    }
}
