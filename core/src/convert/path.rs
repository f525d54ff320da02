// III-IV
// Copyright 2023 Julio Merino
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not
// use this file except in compliance with the License.  You may obtain a copy
// of the License at:
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.  See the
// License for the specific language governing permissions and limitations
// under the License.

//! Dotted-path readers over untyped JSON documents.
//!
//! The plain readers return `None` when the path does not exist or the value has the wrong
//! type.  The `to_safe_*` readers return a `Resulted` that carries `NO_VALUE_FOUND` instead.

use crate::result::{builtin, Resulted};
use log::trace;
use serde_json::Value;

/// Walks the dotted `path` starting at `node`.  Numeric components index into arrays.
pub fn to_node<'a>(node: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = node;
    for key in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(key)?,
            Value::Array(items) => items.get(key.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    match current {
        Value::Null => None,
        node => Some(node),
    }
}

/// Same as `to_node` but reports missing values as `NO_VALUE_FOUND`.
pub fn to_safe_node<'a>(node: &'a Value, path: &str) -> Resulted<&'a Value> {
    match to_node(node, path) {
        Some(value) => Resulted::ok(value),
        None => {
            trace!("No value found at {}", path);
            Resulted::from_result(builtin::NO_VALUE_FOUND)
        }
    }
}

/// Renders a scalar `node` as text.
fn scalar_string(node: &Value) -> Option<String> {
    match node {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Gets the scalar at `path` as text.
pub fn to_string(node: &Value, path: &str) -> Option<String> {
    to_node(node, path).and_then(scalar_string)
}

/// Gets the integer at `path`, if it fits in an `i32`.
pub fn to_i32(node: &Value, path: &str) -> Option<i32> {
    to_i64(node, path).and_then(|v| i32::try_from(v).ok())
}

/// Gets the integer at `path`.
pub fn to_i64(node: &Value, path: &str) -> Option<i64> {
    to_node(node, path).and_then(Value::as_i64)
}

/// Gets the number at `path`.
pub fn to_f64(node: &Value, path: &str) -> Option<f64> {
    to_node(node, path).and_then(Value::as_f64)
}

/// Converts an optional conversion result into a `Resulted`.
fn safe<T>(path: &str, value: Option<T>) -> Resulted<T> {
    match value {
        Some(value) => Resulted::ok(value),
        None => {
            trace!("No convertible value found at {}", path);
            Resulted::from_result(builtin::NO_VALUE_FOUND)
        }
    }
}

/// Same as `to_string` but reports failures as `NO_VALUE_FOUND`.
pub fn to_safe_string(node: &Value, path: &str) -> Resulted<String> {
    safe(path, to_string(node, path))
}

/// Same as `to_i32` but reports failures as `NO_VALUE_FOUND`.
pub fn to_safe_i32(node: &Value, path: &str) -> Resulted<i32> {
    safe(path, to_i32(node, path))
}

/// Same as `to_i64` but reports failures as `NO_VALUE_FOUND`.
pub fn to_safe_i64(node: &Value, path: &str) -> Resulted<i64> {
    safe(path, to_i64(node, path))
}

/// Same as `to_f64` but reports failures as `NO_VALUE_FOUND`.
pub fn to_safe_f64(node: &Value, path: &str) -> Resulted<f64> {
    safe(path, to_f64(node, path))
}

/// Applies `getter` to every element of the array at `path`.
///
/// Returns `None` if there is no array at `path`.
pub fn to_array<T, F>(node: &Value, path: &str, getter: F) -> Option<Vec<T>>
where
    F: Fn(&Value) -> T,
{
    match to_node(node, path)? {
        Value::Array(items) => Some(items.iter().map(getter).collect()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document() -> Value {
        json!({
            "user": {
                "name": "alice",
                "age": 30,
                "score": 4.5,
                "big": 10_000_000_000i64,
                "active": true,
                "tags": ["a", "b"],
                "nothing": null,
            }
        })
    }

    #[test]
    fn test_to_node() {
        let doc = document();
        assert_eq!(Some(&json!("alice")), to_node(&doc, "user.name"));
        assert_eq!(Some(&json!("b")), to_node(&doc, "user.tags.1"));
        assert_eq!(None, to_node(&doc, "user.nothing"));
        assert_eq!(None, to_node(&doc, "user.name.first"));
        assert_eq!(None, to_node(&doc, "user.tags.x"));
    }

    #[test]
    fn test_plain_readers() {
        let doc = document();
        assert_eq!(Some("alice".to_owned()), to_string(&doc, "user.name"));
        assert_eq!(Some("30".to_owned()), to_string(&doc, "user.age"));
        assert_eq!(Some("true".to_owned()), to_string(&doc, "user.active"));
        assert_eq!(None, to_string(&doc, "user.tags"));
        assert_eq!(Some(30), to_i32(&doc, "user.age"));
        assert_eq!(None, to_i32(&doc, "user.big"));
        assert_eq!(Some(10_000_000_000), to_i64(&doc, "user.big"));
        assert_eq!(Some(4.5), to_f64(&doc, "user.score"));
        assert_eq!(None, to_i64(&doc, "user.name"));
    }

    #[test]
    fn test_safe_readers() {
        let doc = document();
        assert_eq!("alice", to_safe_string(&doc, "user.name").into_value());
        assert_eq!(30, to_safe_i32(&doc, "user.age").into_value());
        assert_eq!(10_000_000_000, to_safe_i64(&doc, "user.big").into_value());
        assert_eq!(4.5, to_safe_f64(&doc, "user.score").into_value());
        assert_eq!(&builtin::NO_VALUE_FOUND, to_safe_string(&doc, "user.missing").result());
        assert_eq!(&builtin::NO_VALUE_FOUND, to_safe_i32(&doc, "user.name").result());
        assert_eq!(&builtin::NO_VALUE_FOUND, to_safe_node(&doc, "user.nothing").result());
    }

    #[test]
    fn test_to_array() {
        let doc = document();
        assert_eq!(
            Some(vec!["a".to_owned(), "b".to_owned()]),
            to_array(&doc, "user.tags", |v| v.as_str().unwrap_or_default().to_owned())
        );
        assert_eq!(None, to_array(&doc, "user.name", Value::to_string));
        assert_eq!(None, to_array(&doc, "user.missing", Value::to_string));
    }
}
