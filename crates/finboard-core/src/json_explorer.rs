//! JSON field discovery for the field picker.
//!
//! `flatten_json` walks a document depth-first in key order and emits one
//! `JsonField` per reachable node. Arrays are explored through their first
//! element only, which serves as the representative schema for the rest.

use crate::types::{FieldType, JsonField};
use serde_json::{Map, Value};

/// Path used for a top-level value that has no key of its own.
pub const ROOT_PATH: &str = "root";

/// Enumerate every addressable field of `value`.
pub fn flatten_json(value: &Value) -> Vec<JsonField> {
    let mut fields = Vec::new();

    match value {
        Value::Object(map) => flatten_object(map, "", &mut fields),
        Value::Array(items) => {
            fields.push(JsonField::new(ROOT_PATH, ROOT_PATH, value));
            flatten_first_element(items, "", &mut fields);
        }
        other => fields.push(JsonField::new(ROOT_PATH, ROOT_PATH, other)),
    }

    fields
}

fn flatten_object(map: &Map<String, Value>, prefix: &str, fields: &mut Vec<JsonField>) {
    for (key, child) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };

        fields.push(JsonField::new(path.clone(), key.clone(), child));

        match child {
            Value::Object(nested) => flatten_object(nested, &path, fields),
            Value::Array(items) => flatten_first_element(items, &path, fields),
            _ => {}
        }
    }
}

/// Only a leading object is explored; arrays of scalars are leaves.
fn flatten_first_element(items: &[Value], prefix: &str, fields: &mut Vec<JsonField>) {
    if let Some(first @ Value::Object(map)) = items.first() {
        let indexed = format!("{prefix}[0]");
        fields.push(JsonField::new(indexed.clone(), indexed.clone(), first));
        flatten_object(map, &indexed, fields);
    }
}

/// Resolve a path produced by [`flatten_json`] against a document.
///
/// Accepts `a.b`, `a[2]`, `a[0].b`, `[0].b` and `root`.
pub fn value_by_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path == ROOT_PATH || path.is_empty() {
        return Some(value);
    }

    let mut current = value;
    for segment in path.split('.') {
        let (key, indices) = match segment.find('[') {
            Some(pos) => (&segment[..pos], &segment[pos..]),
            None => (segment, ""),
        };

        if !key.is_empty() {
            current = current.get(key)?;
        }

        for index in parse_indices(indices)? {
            current = current.get(index)?;
        }
    }

    Some(current)
}

/// Parse a run of `[n]` suffixes. `None` on malformed input.
fn parse_indices(mut rest: &str) -> Option<Vec<usize>> {
    let mut indices = Vec::new();
    while !rest.is_empty() {
        let inner = rest.strip_prefix('[')?;
        let end = inner.find(']')?;
        indices.push(inner[..end].parse().ok()?);
        rest = &inner[end + 1..];
    }
    Some(indices)
}

/// Filter fields by a case-insensitive search on path or display name.
pub fn filter_fields<'a>(
    fields: &'a [JsonField],
    search: &str,
    arrays_only: bool,
) -> Vec<&'a JsonField> {
    let needle = search.trim().to_lowercase();

    fields
        .iter()
        .filter(|f| !arrays_only || f.is_array)
        .filter(|f| {
            needle.is_empty()
                || f.path.to_lowercase().contains(&needle)
                || f.display_name.to_lowercase().contains(&needle)
        })
        .collect()
}

/// Fields of a type renderers can show as a single cell.
pub fn is_leaf(field: &JsonField) -> bool {
    !matches!(field.field_type, FieldType::Object | FieldType::Array)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn paths(fields: &[JsonField]) -> Vec<&str> {
        fields.iter().map(|f| f.path.as_str()).collect()
    }

    #[test]
    fn test_flatten_nested_object_and_array() {
        let doc = json!({"a": {"b": 1}, "c": [{"d": 2}]});
        let fields = flatten_json(&doc);

        assert_eq!(paths(&fields), vec!["a", "a.b", "c", "c[0]", "c[0].d"]);

        let c = &fields[2];
        assert!(c.is_array);
        assert_eq!(c.field_type, FieldType::Array);

        let d = &fields[4];
        assert_eq!(d.field_type, FieldType::Number);
        assert_eq!(d.value, json!(2));
        assert_eq!(d.display_name, "d");
    }

    #[test]
    fn test_flatten_explores_first_element_only() {
        let doc = json!({"rows": [{"x": 1}, {"y": 2}]});
        let fields = flatten_json(&doc);
        assert_eq!(paths(&fields), vec!["rows", "rows[0]", "rows[0].x"]);
    }

    #[test]
    fn test_flatten_scalar_array_is_leaf() {
        let doc = json!({"prices": [1.5, 2.5], "name": null});
        let fields = flatten_json(&doc);
        assert_eq!(paths(&fields), vec!["prices", "name"]);
        assert_eq!(fields[1].field_type, FieldType::Null);
    }

    #[test]
    fn test_flatten_top_level_array() {
        let doc = json!([{"id": 7}]);
        let fields = flatten_json(&doc);
        assert_eq!(paths(&fields), vec!["root", "[0]", "[0].id"]);
    }

    #[test]
    fn test_flatten_top_level_scalar() {
        let fields = flatten_json(&json!(3));
        assert_eq!(paths(&fields), vec!["root"]);
        assert_eq!(fields[0].field_type, FieldType::Number);
    }

    #[test]
    fn test_flatten_is_deterministic() {
        let doc = json!({"z": 1, "a": {"m": true, "b": "x"}});
        assert_eq!(flatten_json(&doc), flatten_json(&doc));
        assert_eq!(paths(&flatten_json(&doc)), vec!["z", "a", "a.m", "a.b"]);
    }

    #[test]
    fn test_every_flattened_path_resolves() {
        let doc = json!({"a": {"b": 1}, "c": [{"d": [{"e": "deep"}]}]});
        for field in flatten_json(&doc) {
            let resolved = value_by_path(&doc, &field.path);
            assert_eq!(resolved, Some(&field.value), "path {}", field.path);
        }
    }

    #[test]
    fn test_value_by_path_misses() {
        let doc = json!({"a": [1, 2]});
        assert_eq!(value_by_path(&doc, "a[1]"), Some(&json!(2)));
        assert_eq!(value_by_path(&doc, "a[5]"), None);
        assert_eq!(value_by_path(&doc, "b.c"), None);
        assert_eq!(value_by_path(&doc, "a[x]"), None);
        assert_eq!(value_by_path(&doc, ROOT_PATH), Some(&doc));
    }

    #[test]
    fn test_filter_fields() {
        let doc = json!({"Price": 1, "history": [{"price": 2}], "volume": 3});
        let fields = flatten_json(&doc);

        let hits = filter_fields(&fields, "  PRICE ", false);
        assert_eq!(
            hits.iter().map(|f| f.path.as_str()).collect::<Vec<_>>(),
            vec!["Price", "history[0].price"]
        );

        let arrays = filter_fields(&fields, "", true);
        assert_eq!(arrays.len(), 1);
        assert_eq!(arrays[0].path, "history");

        assert!(is_leaf(&fields[0]));
        assert!(!is_leaf(arrays[0]));
    }
}
