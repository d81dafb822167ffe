//! JSON path lookups over stored values
//!
//! Collection values are opaque bytes. When a value happens to hold a JSON
//! document, [`lookup`] parses it and walks a path of [`PathSegment`]s to a
//! nested element.
//!
//! ```
//! use kdb_core::json::{lookup, PathSegment};
//!
//! let doc = br#"{"user": {"tags": ["a", "b"]}}"#;
//! let path = [PathSegment::from("user"), PathSegment::from("tags"), PathSegment::from(1)];
//! assert_eq!(lookup(doc, &path).unwrap(), Some(serde_json::json!("b")));
//! ```

use std::fmt;

use serde_json::Value;

use crate::error::{KdbError, KdbResult};

/// One step of a JSON path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Object key: `.foo`
    Key(String),
    /// Array index: `[0]`
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(k) => write!(f, ".{}", k),
            PathSegment::Index(i) => write!(f, "[{}]", i),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        PathSegment::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

/// Element at `path` inside `value`
///
/// A segment that does not match the shape of the document (a key into an
/// array, an index past the end) yields `None`.
pub fn get_at_path<'a>(value: &'a Value, path: &[PathSegment]) -> Option<&'a Value> {
    let mut current = value;
    for segment in path {
        current = match (segment, current) {
            (PathSegment::Key(key), Value::Object(obj)) => obj.get(key)?,
            (PathSegment::Index(idx), Value::Array(arr)) => arr.get(*idx)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Parse `bytes` as JSON and return the element at `path`
///
/// Bytes that are not a JSON document are `InvalidInput`.
pub fn lookup(bytes: &[u8], path: &[PathSegment]) -> KdbResult<Option<Value>> {
    let doc: Value = serde_json::from_slice(bytes)
        .map_err(|e| KdbError::invalid_input(format!("value is not a JSON document: {}", e)))?;
    Ok(get_at_path(&doc, path).cloned())
}
