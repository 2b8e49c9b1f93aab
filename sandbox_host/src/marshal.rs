//! # Boundary Codec
//!
//! Converts guest values into plain JSON-like data and host records into
//! guest tables.
//!
//! Only nil, booleans, finite numbers, UTF-8 strings and tables of those cross
//! the boundary. Functions, userdata, threads, cyclic tables and
//! pathologically deep or large values are rejected outright. Conversion
//! recurses once per nesting level and stops at [`DEFAULT_MAX_DEPTH`], so a
//! hostile value cannot exhaust the host's own stack.
//!
//! Tables whose keys are exactly `1..=n` become lists; every other table
//! becomes a keyed map (integer keys are stringified). An empty table is an
//! empty map, which every list-shaped consumer also accepts.

use crate::error::MarshalError;
use mlua::{Lua, LuaSerdeExt, Table, Value};
use serde::Serialize;
use serde_json::{Map, Number, Value as Plain};
use std::ffi::c_void;

pub const DEFAULT_MAX_DEPTH: usize = 32;
pub const DEFAULT_MAX_NODES: usize = 1_000_000;

/// Guest-to-host encoder with depth, size and cycle checks
pub struct PlainEncoder {
    max_depth: usize,
    max_nodes: usize,
    nodes: usize,
    open_tables: Vec<*const c_void>,
    path: Vec<String>,
}

impl PlainEncoder {
    pub fn new(root: &str) -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_nodes: DEFAULT_MAX_NODES,
            nodes: 0,
            open_tables: Vec::new(),
            path: vec![root.to_string()],
        }
    }

    pub fn with_limits(mut self, max_depth: usize, max_nodes: usize) -> Self {
        self.max_depth = max_depth;
        self.max_nodes = max_nodes;
        self
    }

    /// Number of values visited so far
    pub fn nodes(&self) -> usize {
        self.nodes
    }

    pub fn encode(&mut self, value: Value) -> Result<Plain, MarshalError> {
        self.encode_at(value, 0)
    }

    fn path(&self) -> String {
        self.path.concat()
    }

    fn count(&mut self) -> Result<(), MarshalError> {
        self.nodes += 1;
        if self.nodes > self.max_nodes {
            return Err(MarshalError::TooLarge {
                limit: self.max_nodes,
            });
        }
        Ok(())
    }

    fn encode_at(&mut self, value: Value, depth: usize) -> Result<Plain, MarshalError> {
        self.count()?;
        match value {
            Value::Nil => Ok(Plain::Null),
            Value::Boolean(b) => Ok(Plain::Bool(b)),
            Value::Integer(i) => Ok(Plain::Number(i.into())),
            Value::Number(n) => Number::from_f64(n)
                .map(Plain::Number)
                .ok_or_else(|| MarshalError::NonFinite { path: self.path() }),
            Value::String(s) => s
                .to_str()
                .map(|s| Plain::String(s.to_string()))
                .map_err(|_| MarshalError::InvalidString { path: self.path() }),
            Value::Table(table) => self.encode_table(table, depth),
            other => Err(MarshalError::Unsupported {
                path: self.path(),
                kind: other.type_name(),
            }),
        }
    }

    fn encode_table(&mut self, table: Table, depth: usize) -> Result<Plain, MarshalError> {
        if depth >= self.max_depth {
            return Err(MarshalError::TooDeep {
                path: self.path(),
                limit: self.max_depth,
            });
        }
        let ptr = table.to_pointer();
        if self.open_tables.contains(&ptr) {
            return Err(MarshalError::Cycle { path: self.path() });
        }
        self.open_tables.push(ptr);
        let result = self.encode_entries(&table, depth);
        self.open_tables.pop();
        result
    }

    fn encode_entries(&mut self, table: &Table, depth: usize) -> Result<Plain, MarshalError> {
        let mut entries = Vec::new();
        for pair in table.pairs::<Value, Value>() {
            let (key, value) = pair.map_err(|e| MarshalError::Engine(e.to_string()))?;
            if entries.len() >= self.max_nodes {
                return Err(MarshalError::TooLarge {
                    limit: self.max_nodes,
                });
            }
            entries.push((key, value));
        }

        let len = entries.len();
        // unique keys all within 1..=len means the table is exactly a sequence
        let is_sequence = len > 0
            && entries
                .iter()
                .all(|(k, _)| matches!(k, Value::Integer(i) if *i >= 1 && (*i as usize) <= len));

        if is_sequence {
            let mut slots: Vec<Option<Value>> = vec![None; len];
            for (key, value) in entries {
                if let Value::Integer(i) = key {
                    slots[i as usize - 1] = Some(value);
                }
            }
            let mut items = Vec::with_capacity(len);
            for (i, slot) in slots.into_iter().enumerate() {
                self.path.push(format!("[{}]", i + 1));
                let item = self.encode_at(slot.unwrap_or(Value::Nil), depth + 1);
                self.path.pop();
                items.push(item?);
            }
            return Ok(Plain::Array(items));
        }

        let mut map = Map::new();
        for (key, value) in entries {
            let key = match key {
                Value::String(s) => s
                    .to_str()
                    .map(|s| s.to_string())
                    .map_err(|_| MarshalError::InvalidString { path: self.path() })?,
                Value::Integer(i) => i.to_string(),
                other => {
                    return Err(MarshalError::InvalidKey {
                        path: self.path(),
                        reason: format!("{} keys are not allowed", other.type_name()),
                    })
                }
            };
            self.path.push(format!(".{key}"));
            let item = self.encode_at(value, depth + 1);
            self.path.pop();
            map.insert(key, item?);
        }
        Ok(Plain::Object(map))
    }
}

/// Encodes one guest value with default limits
pub fn to_plain(root: &str, value: Value) -> Result<Plain, MarshalError> {
    PlainEncoder::new(root).encode(value)
}

/// Builds a fresh guest table from a host record
pub fn to_guest<T: Serialize>(lua: &Lua, record: &T) -> Result<Value, MarshalError> {
    lua.to_value(record)
        .map_err(|e| MarshalError::Engine(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use game_types::InputSnapshot;
    use serde_json::json;

    fn eval(lua: &Lua, code: &str) -> Value {
        lua.load(code).eval::<Value>().unwrap()
    }

    #[test]
    fn test_sequences_and_maps() {
        let lua = Lua::new();
        let v = eval(&lua, r#"return { {op = "rect", x = 1, w = 2.5}, {op = "save"} }"#);
        assert_eq!(
            to_plain("r", v).unwrap(),
            json!([{"op": "rect", "x": 1, "w": 2.5}, {"op": "save"}])
        );
    }

    #[test]
    fn test_empty_table_is_empty_map() {
        let lua = Lua::new();
        assert_eq!(to_plain("r", eval(&lua, "return {}")).unwrap(), json!({}));
    }

    #[test]
    fn test_sparse_integer_keys_become_map() {
        let lua = Lua::new();
        let v = eval(&lua, "return { [1] = 'a', [3] = 'c' }");
        assert_eq!(to_plain("r", v).unwrap(), json!({"1": "a", "3": "c"}));
    }

    #[test]
    fn test_rejects_functions() {
        let lua = Lua::new();
        let v = eval(&lua, "return { {op = 'text', text = function() end} }");
        let err = to_plain("update()", v).unwrap_err();
        assert_eq!(
            err,
            MarshalError::Unsupported {
                path: "update()[1].text".to_string(),
                kind: "function"
            }
        );
    }

    #[test]
    fn test_rejects_cycles() {
        let lua = Lua::new();
        let v = eval(&lua, "local t = {} t.self = t return t");
        assert!(matches!(to_plain("r", v), Err(MarshalError::Cycle { .. })));
    }

    #[test]
    fn test_shared_subtables_are_not_cycles() {
        let lua = Lua::new();
        let v = eval(&lua, "local p = {1, 2} return { a = p, b = p }");
        assert_eq!(to_plain("r", v).unwrap(), json!({"a": [1, 2], "b": [1, 2]}));
    }

    #[test]
    fn test_rejects_deep_nesting() {
        let lua = Lua::new();
        let v = eval(&lua, "local t = {} for i = 1, 100 do t = { t } end return t");
        assert!(matches!(to_plain("r", v), Err(MarshalError::TooDeep { .. })));
    }

    #[test]
    fn test_rejects_non_finite() {
        let lua = Lua::new();
        let v = eval(&lua, "return { x = 0/0 }");
        assert!(matches!(to_plain("r", v), Err(MarshalError::NonFinite { .. })));
    }

    #[test]
    fn test_rejects_oversized_values() {
        let lua = Lua::new();
        let v = eval(&lua, "local t = {} for i = 1, 50 do t[i] = i end return t");
        let mut encoder = PlainEncoder::new("r").with_limits(8, 20);
        assert_eq!(
            encoder.encode(v),
            Err(MarshalError::TooLarge { limit: 20 })
        );
    }

    #[test]
    fn test_rejects_table_keys() {
        let lua = Lua::new();
        let v = eval(&lua, "return { [{}] = 1 }");
        assert!(matches!(to_plain("r", v), Err(MarshalError::InvalidKey { .. })));
    }

    #[test]
    fn test_input_snapshot_reaches_guest_as_table() {
        let lua = Lua::new();
        let snap = InputSnapshot {
            left: true,
            pointer_x: 42.0,
            ..InputSnapshot::default()
        };
        let value = to_guest(&lua, &snap).unwrap();
        let table = match value {
            Value::Table(t) => t,
            other => panic!("expected table, got {other:?}"),
        };
        assert!(table.get::<bool>("left").unwrap());
        assert!(!table.get::<bool>("aPressed").unwrap());
        assert_eq!(table.get::<f64>("pointerX").unwrap(), 42.0);
    }
}
