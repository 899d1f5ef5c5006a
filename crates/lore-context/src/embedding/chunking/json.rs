//! JSON chunking along object boundaries.
//!
//! Oversized containers are drilled into: objects prefer their nested arrays
//! of objects over nested objects, arrays expand oversized object elements.
//! Keys that are not drilled into are left out of the output entirely.

use lore_core::{Error, Result};
use serde_json::Value;

use super::{char_len, pack_pieces};

/// Chunker that never splits a single JSON element across chunks
#[derive(Debug, Clone)]
pub struct JsonChunker {
    max_size: usize,
}

impl JsonChunker {
    /// Create a chunker producing chunks of at most `max_size` characters
    /// (a single element larger than that is still emitted whole)
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size: max_size.max(1),
        }
    }

    /// Split JSON content into groups of compact-serialized elements
    ///
    /// # Errors
    /// Returns [`Error::InvalidContent`] if `content` is not valid JSON
    pub fn chunk(&self, content: &str) -> Result<Vec<String>> {
        let root: Value = serde_json::from_str(content)
            .map_err(|error| Error::InvalidContent(format!("Invalid JSON content: {error}")))?;

        let serialized = root.to_string();
        if char_len(&serialized) <= self.max_size {
            return Ok(vec![serialized]);
        }

        let mut elements = Vec::default();
        self.extract_elements(&root, &mut elements);
        if elements.is_empty() {
            return Ok(vec![serialized]);
        }

        Ok(pack_pieces(
            elements.into_iter().map(Value::to_string),
            self.max_size,
        ))
    }

    /// Collect the elements that become chunk pieces
    fn extract_elements<'value>(&self, value: &'value Value, out: &mut Vec<&'value Value>) {
        match value {
            Value::Array(items) => self.extract_from_array(items, out),
            Value::Object(map) if self.should_drill_down(value) => {
                let arrays: Vec<&Value> = map.values().filter(|child| child.is_array()).collect();
                if !arrays.is_empty() {
                    let object_arrays: Vec<&Value> = arrays
                        .iter()
                        .copied()
                        .filter(|child| Self::array_contains_objects(child))
                        .collect();
                    let selected = if object_arrays.is_empty() {
                        arrays
                    } else {
                        object_arrays
                    };
                    for child in selected {
                        self.extract_elements(child, out);
                    }
                    return;
                }

                let objects: Vec<&Value> = map.values().filter(|child| child.is_object()).collect();
                if objects.is_empty() {
                    out.push(value);
                } else {
                    for child in objects {
                        self.extract_elements(child, out);
                    }
                }
            }
            _ => out.push(value),
        }
    }

    /// Keep scalars as-is; expand oversized objects only in arrays that hold objects
    fn extract_from_array<'value>(&self, items: &'value [Value], out: &mut Vec<&'value Value>) {
        let has_object = items.iter().any(Value::is_object);
        for child in items {
            if has_object && self.should_drill_down(child) {
                self.extract_elements(child, out);
            } else {
                out.push(child);
            }
        }
    }

    /// Whether `value` is an oversized container with structure worth expanding
    fn should_drill_down(&self, value: &Value) -> bool {
        let has_structure = match value {
            Value::Array(_) => Self::array_contains_objects(value),
            Value::Object(map) => map.values().any(|child| match child {
                Value::Array(_) => Self::array_contains_objects(child),
                Value::Object(_) => true,
                _ => false,
            }),
            _ => return false,
        };
        has_structure && char_len(&value.to_string()) > self.max_size
    }

    fn array_contains_objects(value: &Value) -> bool {
        value
            .as_array()
            .is_some_and(|items| items.iter().any(Value::is_object))
    }
}
