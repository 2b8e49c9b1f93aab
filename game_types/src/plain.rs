//! # Plain-Data Decoding
//!
//! Helpers for turning the plain JSON-like values that cross the sandbox
//! boundary into typed records.
//!
//! Guest tables do not distinguish an empty list from an empty map, so every
//! list-shaped field accepts an empty map as an empty list. Numbers arrive as
//! integers or floats depending on how the guest computed them; whole floats
//! are accepted wherever an integer is expected. Anything else is rejected.

use crate::command::Command;
use serde::de::{DeserializeOwned, Error as DeError};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors produced while decoding a frame's command list
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandDecodeError {
    #[error("update() returned {count} commands (limit {limit})")]
    TooMany { count: usize, limit: usize },

    #[error("command #{index} is invalid: {message}")]
    Invalid { index: usize, message: String },
}

/// Returns a short name for the kind of a plain value
pub fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "table",
    }
}

/// Decodes the value returned by a guest `update` into commands
///
/// Anything that is not a list (nil, a scalar, a keyed table) is an empty
/// frame. Command indices in errors are 1-based, matching guest-side list
/// indices.
pub fn decode_commands(value: Value, limit: usize) -> Result<Vec<Command>, CommandDecodeError> {
    let items = match value {
        Value::Array(items) => items,
        _ => Vec::new(),
    };

    if items.len() > limit {
        return Err(CommandDecodeError::TooMany {
            count: items.len(),
            limit,
        });
    }

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            if !item.is_object() {
                return Err(CommandDecodeError::Invalid {
                    index: i + 1,
                    message: format!("expected a table, found {}", kind_of(&item)),
                });
            }
            Command::deserialize(item).map_err(|e| CommandDecodeError::Invalid {
                index: i + 1,
                message: e.to_string(),
            })
        })
        .collect()
}

/// Deserializes a list, accepting an empty table as an empty list
pub fn list_or_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .map(|item| T::deserialize(item).map_err(D::Error::custom))
            .collect(),
        Value::Object(map) if map.is_empty() => Ok(Vec::new()),
        other => Err(D::Error::custom(format!(
            "expected a list, found {}",
            kind_of(&other)
        ))),
    }
}

/// Deserializes a keyed table, accepting an empty list as an empty table
pub fn map_or_empty<'de, D, T>(deserializer: D) -> Result<BTreeMap<String, T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Value::deserialize(deserializer)? {
        Value::Object(map) => map
            .into_iter()
            .map(|(k, v)| {
                T::deserialize(v)
                    .map(|t| (k.clone(), t))
                    .map_err(|e| D::Error::custom(format!("{k}: {e}")))
            })
            .collect(),
        Value::Array(items) if items.is_empty() => Ok(BTreeMap::new()),
        other => Err(D::Error::custom(format!(
            "expected a table, found {}",
            kind_of(&other)
        ))),
    }
}

fn whole(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        _ => None,
    }
}

/// Deserializes a non-negative whole number into `u32`
pub fn whole_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    whole(&value)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| D::Error::custom(format!("expected a whole number, found {value}")))
}

/// Deserializes an optional non-negative whole number into `u32`
pub fn opt_whole_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    whole(&value)
        .and_then(|n| u32::try_from(n).ok())
        .map(Some)
        .ok_or_else(|| D::Error::custom(format!("expected a whole number, found {value}")))
}

/// Deserializes an optional whole number (channel indices may be out of range)
pub fn opt_whole_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    whole(&value)
        .map(Some)
        .ok_or_else(|| D::Error::custom(format!("expected a whole number, found {value}")))
}

/// Deserializes text that guests may also supply as a bare number
pub fn text_value<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(match whole(&Value::Number(n.clone())) {
            Some(i) => i.to_string(),
            None => n.to_string(),
        }),
        other => Err(D::Error::custom(format!(
            "expected text, found {}",
            kind_of(&other)
        ))),
    }
}
