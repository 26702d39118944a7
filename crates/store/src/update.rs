//! Update operator application (`$set`, `$inc`, `$push`, ...).

use std::cmp::Ordering;

use labcheck_core::{get_path, remove_path, set_path, Document, Error, Result, Value, ID_FIELD};

use crate::compare::{compare_values, values_equal};
use crate::filter::{Filter, MatchContext};

/// Validate that an update document only holds known operators.
pub(crate) fn validate_update(update: &Document) -> Result<()> {
    if update.is_empty() {
        return Err(Error::InvalidUpdate(
            "Update document requires atomic operators".to_string(),
        ));
    }
    for (op, fields) in update {
        if !op.starts_with('$') {
            return Err(Error::InvalidUpdate(
                "Update document requires atomic operators".to_string(),
            ));
        }
        if !KNOWN_OPERATORS.contains(&op.as_str()) {
            return Err(Error::InvalidUpdate(format!(
                "Unknown modifier: {}. Expected a valid update modifier",
                op
            )));
        }
        if !fields.is_object() {
            return Err(Error::InvalidUpdate(format!(
                "Modifiers operate on fields but we found type {} instead",
                labcheck_core::type_name(fields)
            )));
        }
    }
    Ok(())
}

const KNOWN_OPERATORS: &[&str] = &[
    "$set",
    "$unset",
    "$inc",
    "$mul",
    "$min",
    "$max",
    "$rename",
    "$push",
    "$pull",
    "$addToSet",
    "$pop",
    "$currentDate",
    "$setOnInsert",
];

/// Apply an update document in place.
///
/// Returns whether the document changed. `is_insert` enables `$setOnInsert`
/// (used by upserts).
pub(crate) fn apply_update(doc: &mut Document, update: &Document, is_insert: bool) -> Result<bool> {
    validate_update(update)?;
    let before = doc.clone();

    for (op, fields) in update {
        let Value::Object(fields) = fields else {
            continue;
        };
        for (path, operand) in fields {
            if path == ID_FIELD || path.starts_with("_id.") {
                let unchanged = op == "$set"
                    && get_path(doc, path).map_or(false, |current| values_equal(current, operand));
                if !unchanged && op != "$setOnInsert" {
                    return Err(Error::InvalidUpdate(format!(
                        "Performing an update on the path '{}' would modify the immutable field '_id'",
                        path
                    )));
                }
            }
            apply_operator(doc, op, path, operand, is_insert)?;
        }
    }

    Ok(*doc != before)
}

fn apply_operator(
    doc: &mut Document,
    op: &str,
    path: &str,
    operand: &Value,
    is_insert: bool,
) -> Result<()> {
    match op {
        "$set" => set_path(doc, path, operand.clone()),
        "$setOnInsert" => {
            if is_insert {
                set_path(doc, path, operand.clone())?;
            }
            Ok(())
        }
        "$unset" => {
            remove_path(doc, path);
            Ok(())
        }
        "$inc" | "$mul" => {
            if !operand.is_number() {
                return Err(Error::InvalidUpdate(format!(
                    "Cannot {} with non-numeric argument: {{{}: {}}}",
                    &op[1..],
                    path,
                    operand
                )));
            }
            let next = match get_path(doc, path) {
                None => {
                    if op == "$inc" {
                        operand.clone()
                    } else {
                        Value::from(0)
                    }
                }
                Some(current) if current.is_number() => {
                    if op == "$inc" {
                        add_numbers(current, operand)
                    } else {
                        mul_numbers(current, operand)
                    }
                }
                Some(current) => {
                    return Err(Error::InvalidUpdate(format!(
                        "Cannot apply {} to a value of non-numeric type. {{_id: {}}} has the field '{}' of non-numeric type {}",
                        op,
                        doc.get(ID_FIELD).cloned().unwrap_or(Value::Null),
                        path,
                        labcheck_core::type_name(current)
                    )))
                }
            };
            set_path(doc, path, next)
        }
        "$min" | "$max" => {
            let wanted = if op == "$min" {
                Ordering::Less
            } else {
                Ordering::Greater
            };
            let replace = match get_path(doc, path) {
                None => true,
                Some(current) => compare_values(operand, current) == wanted,
            };
            if replace {
                set_path(doc, path, operand.clone())?;
            }
            Ok(())
        }
        "$rename" => {
            let target = operand.as_str().ok_or_else(|| {
                Error::InvalidUpdate(format!("The 'to' field for $rename must be a string: {}", path))
            })?;
            if let Some(value) = remove_path(doc, path) {
                set_path(doc, target, value)?;
            }
            Ok(())
        }
        "$currentDate" => set_path(doc, path, Value::from(chrono::Utc::now().to_rfc3339())),
        "$push" | "$addToSet" => {
            let items = match operand {
                Value::Object(map) if map.contains_key("$each") => map["$each"]
                    .as_array()
                    .cloned()
                    .ok_or_else(|| Error::InvalidUpdate("The argument to $each must be an array".to_string()))?,
                other => vec![other.clone()],
            };
            let mut array = array_at(doc, op, path)?;
            for item in items {
                if op == "$addToSet" && array.iter().any(|v| values_equal(v, &item)) {
                    continue;
                }
                array.push(item);
            }
            set_path(doc, path, Value::Array(array))
        }
        "$pull" => {
            if get_path(doc, path).is_none() {
                return Ok(());
            }
            let array = array_at(doc, op, path)?;
            let kept = array
                .into_iter()
                .filter(|item| !pull_matches(item, operand))
                .collect::<Vec<_>>();
            set_path(doc, path, Value::Array(kept))
        }
        "$pop" => {
            let mut array = array_at(doc, op, path)?;
            match operand.as_i64() {
                Some(1) => {
                    array.pop();
                }
                Some(-1) => {
                    if !array.is_empty() {
                        array.remove(0);
                    }
                }
                _ => {
                    return Err(Error::InvalidUpdate(
                        "$pop expects 1 or -1".to_string(),
                    ))
                }
            }
            set_path(doc, path, Value::Array(array))
        }
        other => Err(Error::InvalidUpdate(format!("Unknown modifier: {}", other))),
    }
}

fn array_at(doc: &Document, op: &str, path: &str) -> Result<Vec<Value>> {
    match get_path(doc, path) {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(other) => Err(Error::InvalidUpdate(format!(
            "The field '{}' must be an array but is of type {} ({})",
            path,
            labcheck_core::type_name(other),
            op
        ))),
    }
}

fn pull_matches(item: &Value, condition: &Value) -> bool {
    match condition {
        // Operator conditions apply to the element itself
        Value::Object(map) if !map.is_empty() && map.keys().all(|k| k.starts_with('$')) => {
            let mut filter_doc = Document::new();
            filter_doc.insert("v".to_string(), condition.clone());
            let mut wrapper = Document::new();
            wrapper.insert("v".to_string(), item.clone());
            Filter::compile(&filter_doc)
                .map(|f| f.matches(&wrapper, &MatchContext::default()))
                .unwrap_or(false)
        }
        Value::Object(map) => match item {
            Value::Object(inner) => Filter::compile(map)
                .map(|f| f.matches(inner, &MatchContext::default()))
                .unwrap_or(false),
            _ => false,
        },
        other => values_equal(item, other),
    }
}

/// Add two JSON numbers, staying integral when both are integers.
pub(crate) fn add_numbers(a: &Value, b: &Value) -> Value {
    match (a.as_i64(), b.as_i64()) {
        (Some(x), Some(y)) => x.checked_add(y).map(Value::from).unwrap_or_else(|| {
            float_value(x as f64 + y as f64)
        }),
        _ => float_value(a.as_f64().unwrap_or(0.0) + b.as_f64().unwrap_or(0.0)),
    }
}

/// Multiply two JSON numbers, staying integral when both are integers.
pub(crate) fn mul_numbers(a: &Value, b: &Value) -> Value {
    match (a.as_i64(), b.as_i64()) {
        (Some(x), Some(y)) => x.checked_mul(y).map(Value::from).unwrap_or_else(|| {
            float_value(x as f64 * y as f64)
        }),
        _ => float_value(a.as_f64().unwrap_or(0.0) * b.as_f64().unwrap_or(0.0)),
    }
}

/// JSON number from an f64; non-finite results become null.
pub(crate) fn float_value(f: f64) -> Value {
    serde_json::Number::from_f64(f)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use labcheck_core::into_document;
    use serde_json::json;

    fn doc(v: Value) -> Document {
        into_document(v).unwrap()
    }

    #[test]
    fn test_set_and_inc() {
        let mut d = doc(json!({"_id": 1, "qty": 2}));
        let changed = apply_update(&mut d, &doc(json!({"$set": {"status": "shipped"}, "$inc": {"qty": 3}})), false).unwrap();
        assert!(changed);
        assert_eq!(d["qty"], json!(5));
        assert_eq!(d["status"], json!("shipped"));
    }

    #[test]
    fn test_noop_update_reports_unchanged() {
        let mut d = doc(json!({"_id": 1, "status": "open"}));
        let changed = apply_update(&mut d, &doc(json!({"$set": {"status": "open"}})), false).unwrap();
        assert!(!changed);
    }

    #[test]
    fn test_replacement_document_rejected() {
        let mut d = doc(json!({"_id": 1}));
        let err = apply_update(&mut d, &doc(json!({"status": "x"})), false).unwrap_err();
        assert!(err.to_string().contains("atomic operators"));
    }

    #[test]
    fn test_unknown_modifier() {
        let mut d = doc(json!({"_id": 1}));
        let err = apply_update(&mut d, &doc(json!({"$sett": {"a": 1}})), false).unwrap_err();
        assert!(err.to_string().contains("Unknown modifier: $sett"));
    }

    #[test]
    fn test_id_is_immutable() {
        let mut d = doc(json!({"_id": 1}));
        assert!(apply_update(&mut d, &doc(json!({"$set": {"_id": 2}})), false).is_err());
        assert!(apply_update(&mut d, &doc(json!({"$set": {"_id": 1}})), false).is_ok());
    }

    #[test]
    fn test_inc_non_numeric_fails() {
        let mut d = doc(json!({"_id": 1, "name": "x"}));
        assert!(apply_update(&mut d, &doc(json!({"$inc": {"name": 1}})), false).is_err());
    }

    #[test]
    fn test_push_each_and_add_to_set() {
        let mut d = doc(json!({"_id": 1, "tags": ["a"]}));
        apply_update(&mut d, &doc(json!({"$push": {"tags": {"$each": ["b", "c"]}}})), false).unwrap();
        apply_update(&mut d, &doc(json!({"$addToSet": {"tags": "a"}})), false).unwrap();
        assert_eq!(d["tags"], json!(["a", "b", "c"]));
    }

    #[test]
    fn test_pull_by_value_and_condition() {
        let mut d = doc(json!({"_id": 1, "scores": [50, 80, 95], "items": [{"sku": "A"}, {"sku": "B"}]}));
        apply_update(&mut d, &doc(json!({"$pull": {"scores": {"$lt": 60}}})), false).unwrap();
        apply_update(&mut d, &doc(json!({"$pull": {"items": {"sku": "A"}}})), false).unwrap();
        assert_eq!(d["scores"], json!([80, 95]));
        assert_eq!(d["items"], json!([{"sku": "B"}]));
    }

    #[test]
    fn test_min_max_rename_unset() {
        let mut d = doc(json!({"_id": 1, "low": 5, "high": 5, "old": "v", "tmp": 1}));
        apply_update(
            &mut d,
            &doc(json!({"$min": {"low": 3}, "$max": {"high": 9}, "$rename": {"old": "new"}, "$unset": {"tmp": ""}})),
            false,
        )
        .unwrap();
        assert_eq!(d, doc(json!({"_id": 1, "low": 3, "high": 9, "new": "v"})));
    }

    #[test]
    fn test_set_on_insert_only_on_insert() {
        let mut d = doc(json!({"_id": 1}));
        apply_update(&mut d, &doc(json!({"$setOnInsert": {"created": true}})), false).unwrap();
        assert!(d.get("created").is_none());
        apply_update(&mut d, &doc(json!({"$setOnInsert": {"created": true}})), true).unwrap();
        assert_eq!(d["created"], json!(true));
    }

    #[test]
    fn test_number_arithmetic() {
        assert_eq!(add_numbers(&json!(2), &json!(3)), json!(5));
        assert_eq!(add_numbers(&json!(2), &json!(0.5)), json!(2.5));
        assert_eq!(mul_numbers(&json!(4), &json!(1.5)), json!(6.0));
    }
}
