//! Document representation and dotted-path helpers
//!
//! A [`Document`] is a JSON object. Field paths use dot notation
//! (`address.city`, `items.0.sku`); numeric segments index into arrays.
//!
//! Two lookup flavours exist:
//! - [`get_path`] follows the path strictly and yields at most one value
//!   (used by updates, projections and sorting).
//! - [`lookup_path`] fans out across arrays of sub-documents the way a
//!   document query does, so `items.sku` reaches every `sku` in `items`.

use crate::error::{Error, Result};
pub use serde_json::{Map, Value};

/// A stored document: an ordered JSON object.
pub type Document = Map<String, Value>;

/// Name of the identifier field every stored document carries.
pub const ID_FIELD: &str = "_id";

/// Generate a fresh document identifier.
///
/// Identifiers are 24 lowercase hex characters, the same width as the
/// object identifiers students see in the course material.
pub fn generate_id() -> Value {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    Value::String(hex[..24].to_string())
}

/// Convert an arbitrary JSON value into a document.
///
/// # Errors
///
/// Returns [`Error::InvalidQuery`] when the value is not an object.
pub fn into_document(value: Value) -> Result<Document> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(Error::InvalidQuery(format!(
            "expected a document, got {}",
            type_name(&other)
        ))),
    }
}

/// Short type name used in error messages.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Resolve a dotted path strictly, without fanning out over arrays.
pub fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = doc.get(first)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Resolve a dotted path with query semantics.
///
/// Arrays of sub-documents are traversed element by element, and a numeric
/// segment additionally selects a positional element.
pub fn lookup_path<'a>(doc: &'a Document, path: &str) -> Vec<&'a Value> {
    let segments: Vec<&str> = path.split('.').collect();
    let mut out = Vec::new();
    if let Some(first) = doc.get(segments[0]) {
        collect(first, &segments[1..], &mut out);
    }
    out
}

fn collect<'a>(value: &'a Value, segments: &[&str], out: &mut Vec<&'a Value>) {
    let Some((head, rest)) = segments.split_first() else {
        out.push(value);
        return;
    };
    match value {
        Value::Object(map) => {
            if let Some(child) = map.get(*head) {
                collect(child, rest, out);
            }
        }
        Value::Array(items) => {
            if let Ok(index) = head.parse::<usize>() {
                if let Some(child) = items.get(index) {
                    collect(child, rest, out);
                }
            }
            for item in items.iter().filter(|item| item.is_object()) {
                collect(item, segments, out);
            }
        }
        _ => {}
    }
}

/// Set the value at a dotted path, creating intermediate sub-documents.
///
/// # Errors
///
/// Fails when an intermediate segment holds a scalar, or when a numeric
/// segment points past the end of an array.
pub fn set_path(doc: &mut Document, path: &str, value: Value) -> Result<()> {
    let segments: Vec<&str> = path.split('.').collect();
    let (last, parents) = match segments.split_last() {
        Some(split) => split,
        None => return Err(Error::InvalidUpdate("empty field path".to_string())),
    };

    let mut current: &mut Value = match parents.first() {
        None => {
            doc.insert((*last).to_string(), value);
            return Ok(());
        }
        Some(first) => doc
            .entry((*first).to_string())
            .or_insert_with(|| Value::Object(Map::new())),
    };

    for segment in parents.iter().skip(1) {
        current = descend_mut(current, segment, path)?;
    }

    match current {
        Value::Object(map) => {
            map.insert((*last).to_string(), value);
            Ok(())
        }
        Value::Array(items) => {
            let index = last.parse::<usize>().map_err(|_| cannot_create(path))?;
            let len = items.len();
            if index < len {
                items[index] = value;
            } else if index == len {
                items.push(value);
            } else {
                return Err(cannot_create(path));
            }
            Ok(())
        }
        _ => Err(cannot_create(path)),
    }
}

fn descend_mut<'a>(value: &'a mut Value, segment: &str, path: &str) -> Result<&'a mut Value> {
    match value {
        Value::Object(map) => Ok(map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()))),
        Value::Array(items) => {
            let index = segment.parse::<usize>().map_err(|_| cannot_create(path))?;
            items.get_mut(index).ok_or_else(|| cannot_create(path))
        }
        _ => Err(cannot_create(path)),
    }
}

fn cannot_create(path: &str) -> Error {
    Error::InvalidUpdate(format!("Cannot create field in path '{}'", path))
}

/// Remove the value at a dotted path, returning it if present.
pub fn remove_path(doc: &mut Document, path: &str) -> Option<Value> {
    let segments: Vec<&str> = path.split('.').collect();
    let (last, parents) = segments.split_last()?;
    if parents.is_empty() {
        return doc.remove(*last);
    }
    let mut current = doc.get_mut(parents[0])?;
    for segment in &parents[1..] {
        current = match current {
            Value::Object(map) => map.get_mut(*segment)?,
            Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    match current {
        Value::Object(map) => map.remove(*last),
        // Removing an array element leaves a null in place, keeping positions stable
        Value::Array(items) => {
            let slot = items.get_mut(last.parse::<usize>().ok()?)?;
            Some(std::mem::replace(slot, Value::Null))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        into_document(value).unwrap()
    }

    #[test]
    fn test_generate_id_shape() {
        let id = generate_id();
        let s = id.as_str().unwrap();
        assert_eq!(s.len(), 24);
        assert!(s.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(generate_id(), id);
    }

    #[test]
    fn test_into_document_rejects_scalars() {
        assert!(into_document(json!(5)).is_err());
        assert!(into_document(json!({"a": 1})).is_ok());
    }

    #[test]
    fn test_get_path_nested_and_indexed() {
        let d = doc(json!({"address": {"city": "Austin"}, "tags": ["a", "b"]}));
        assert_eq!(get_path(&d, "address.city"), Some(&json!("Austin")));
        assert_eq!(get_path(&d, "tags.1"), Some(&json!("b")));
        assert_eq!(get_path(&d, "tags.5"), None);
        assert_eq!(get_path(&d, "address.zip"), None);
    }

    #[test]
    fn test_lookup_path_fans_out_over_arrays() {
        let d = doc(json!({"items": [{"sku": "A"}, {"sku": "B"}, {"qty": 3}]}));
        let found = lookup_path(&d, "items.sku");
        assert_eq!(found, vec![&json!("A"), &json!("B")]);
    }

    #[test]
    fn test_lookup_path_positional() {
        let d = doc(json!({"items": [{"sku": "A"}, {"sku": "B"}]}));
        assert_eq!(lookup_path(&d, "items.1.sku"), vec![&json!("B")]);
    }

    #[test]
    fn test_set_path_creates_intermediates() {
        let mut d = doc(json!({"name": "x"}));
        set_path(&mut d, "meta.audit.by", json!("lab")).unwrap();
        assert_eq!(get_path(&d, "meta.audit.by"), Some(&json!("lab")));
    }

    #[test]
    fn test_set_path_through_scalar_fails() {
        let mut d = doc(json!({"name": "x"}));
        assert!(set_path(&mut d, "name.first", json!("y")).is_err());
    }

    #[test]
    fn test_set_path_array_index() {
        let mut d = doc(json!({"tags": ["a", "b"]}));
        set_path(&mut d, "tags.0", json!("z")).unwrap();
        set_path(&mut d, "tags.2", json!("c")).unwrap();
        assert_eq!(d["tags"], json!(["z", "b", "c"]));
        assert!(set_path(&mut d, "tags.9", json!("q")).is_err());
    }

    #[test]
    fn test_remove_path() {
        let mut d = doc(json!({"a": {"b": 1, "c": 2}}));
        assert_eq!(remove_path(&mut d, "a.b"), Some(json!(1)));
        assert_eq!(remove_path(&mut d, "a.b"), None);
        assert_eq!(d, doc(json!({"a": {"c": 2}})));
    }

    proptest::proptest! {
        #[test]
        fn test_set_then_get_path(segments in proptest::collection::vec("[a-z]{1,6}", 1..4), n in proptest::num::i64::ANY) {
            let path = segments.join(".");
            let mut d = Document::new();
            set_path(&mut d, &path, json!(n)).unwrap();
            proptest::prop_assert_eq!(get_path(&d, &path), Some(&json!(n)));
            proptest::prop_assert_eq!(remove_path(&mut d, &path), Some(json!(n)));
            proptest::prop_assert_eq!(get_path(&d, &path), None);
        }
    }
}
