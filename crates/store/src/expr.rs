//! Aggregation expression evaluation (`"$field"`, `{ $multiply: [...] }`, ...).

use chrono::{DateTime, Datelike, NaiveDate};
use labcheck_core::{get_path, lookup_path, Document, Error, Map, Result, Value};

use crate::compare::{compare_values, is_truthy, values_equal};
use crate::update::{add_numbers, float_value, mul_numbers};

/// Evaluate an expression against a document.
pub(crate) fn eval(expr: &Value, doc: &Document) -> Result<Value> {
    match expr {
        Value::String(s) if s == "$$ROOT" => Ok(Value::Object(doc.clone())),
        Value::String(s) if s.starts_with("$$") => Err(Error::InvalidPipeline(format!(
            "Use of undefined variable: {}",
            &s[2..]
        ))),
        Value::String(s) if s.starts_with('$') => Ok(field_value(doc, &s[1..])),
        Value::Array(items) => items
            .iter()
            .map(|item| eval(item, doc))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Value::Object(map) => match single_operator(map) {
            Some((op, args)) => eval_operator(op, args, doc),
            None => {
                let mut out = Map::new();
                for (key, value) in map {
                    out.insert(key.clone(), eval(value, doc)?);
                }
                Ok(Value::Object(out))
            }
        },
        literal => Ok(literal.clone()),
    }
}

fn single_operator(map: &Map<String, Value>) -> Option<(&str, &Value)> {
    if map.len() != 1 {
        return None;
    }
    map.iter()
        .next()
        .filter(|(k, _)| k.starts_with('$'))
        .map(|(k, v)| (k.as_str(), v))
}

/// Value of a field path; paths crossing arrays yield an array of hits.
fn field_value(doc: &Document, path: &str) -> Value {
    if let Some(value) = get_path(doc, path) {
        return value.clone();
    }
    let hits = lookup_path(doc, path);
    if hits.is_empty() {
        Value::Null
    } else {
        Value::Array(hits.into_iter().cloned().collect())
    }
}

fn args_list(op: &str, args: &Value, doc: &Document) -> Result<Vec<Value>> {
    let evaluated: Result<Vec<Value>> = match args {
        Value::Array(items) => items.iter().map(|a| eval(a, doc)).collect(),
        single => eval(single, doc).map(|v| vec![v]),
    };
    evaluated.map_err(|e| match e {
        Error::InvalidPipeline(msg) => Error::InvalidPipeline(format!("{}: {}", op, msg)),
        other => other,
    })
}

fn expect_args(op: &str, args: &[Value], n: usize) -> Result<()> {
    if args.len() != n {
        return Err(Error::InvalidPipeline(format!(
            "Expression {} takes exactly {} arguments. {} were passed in.",
            op,
            n,
            args.len()
        )));
    }
    Ok(())
}

fn numbers(op: &str, args: &[Value]) -> Result<()> {
    for arg in args {
        if !arg.is_number() && !arg.is_null() {
            return Err(Error::InvalidPipeline(format!(
                "{} only supports numeric types, not {}",
                op,
                labcheck_core::type_name(arg)
            )));
        }
    }
    Ok(())
}

fn eval_operator(op: &str, raw: &Value, doc: &Document) -> Result<Value> {
    match op {
        "$literal" => return Ok(raw.clone()),
        "$cond" => return eval_cond(raw, doc),
        _ => {}
    }

    let args = args_list(op, raw, doc)?;
    match op {
        "$add" => {
            numbers(op, &args)?;
            if args.iter().any(Value::is_null) {
                return Ok(Value::Null);
            }
            Ok(args.iter().fold(Value::from(0), |acc, v| add_numbers(&acc, v)))
        }
        "$multiply" => {
            numbers(op, &args)?;
            if args.iter().any(Value::is_null) {
                return Ok(Value::Null);
            }
            Ok(args.iter().fold(Value::from(1), |acc, v| mul_numbers(&acc, v)))
        }
        "$subtract" => {
            expect_args(op, &args, 2)?;
            numbers(op, &args)?;
            match (args[0].as_f64(), args[1].as_f64()) {
                (Some(_), Some(_)) => Ok(add_numbers(&args[0], &negate(&args[1]))),
                _ => Ok(Value::Null),
            }
        }
        "$divide" => {
            expect_args(op, &args, 2)?;
            numbers(op, &args)?;
            match (args[0].as_f64(), args[1].as_f64()) {
                (_, Some(d)) if d == 0.0 => Err(Error::InvalidPipeline("can't $divide by zero".to_string())),
                (Some(n), Some(d)) => Ok(float_value(n / d)),
                _ => Ok(Value::Null),
            }
        }
        "$round" => {
            let places = args.get(1).and_then(Value::as_i64).unwrap_or(0) as i32;
            match args.first().and_then(Value::as_f64) {
                Some(n) => {
                    let factor = 10f64.powi(places);
                    Ok(float_value((n * factor).round() / factor))
                }
                None => Ok(Value::Null),
            }
        }
        "$concat" => {
            let mut out = String::new();
            for arg in &args {
                match arg {
                    Value::String(s) => out.push_str(s),
                    Value::Null => return Ok(Value::Null),
                    other => {
                        return Err(Error::InvalidPipeline(format!(
                            "$concat only supports strings, not {}",
                            labcheck_core::type_name(other)
                        )))
                    }
                }
            }
            Ok(Value::String(out))
        }
        "$toUpper" | "$toLower" => {
            let s = match args.first() {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            };
            Ok(Value::String(if op == "$toUpper" {
                s.to_uppercase()
            } else {
                s.to_lowercase()
            }))
        }
        "$size" => match args.first() {
            Some(Value::Array(items)) => Ok(Value::from(items.len())),
            _ => Err(Error::InvalidPipeline(
                "The argument to $size must be an array".to_string(),
            )),
        },
        "$sum" | "$avg" | "$max" | "$min" => {
            let values: Vec<Value> = match args.as_slice() {
                [Value::Array(items)] => items.clone(),
                other => other.to_vec(),
            };
            Ok(fold_numbers(op, &values))
        }
        "$ifNull" => Ok(args
            .iter()
            .find(|v| !v.is_null())
            .cloned()
            .unwrap_or(Value::Null)),
        "$eq" | "$ne" | "$gt" | "$gte" | "$lt" | "$lte" => {
            expect_args(op, &args, 2)?;
            let ord = compare_values(&args[0], &args[1]);
            let result = match op {
                "$eq" => values_equal(&args[0], &args[1]),
                "$ne" => !values_equal(&args[0], &args[1]),
                "$gt" => ord.is_gt(),
                "$gte" => ord.is_ge(),
                "$lt" => ord.is_lt(),
                _ => ord.is_le(),
            };
            Ok(Value::Bool(result))
        }
        "$and" => Ok(Value::Bool(args.iter().all(is_truthy))),
        "$or" => Ok(Value::Bool(args.iter().any(is_truthy))),
        "$not" => Ok(Value::Bool(!args.first().map(is_truthy).unwrap_or(false))),
        "$year" | "$month" | "$dayOfMonth" => match args.first().and_then(parse_date) {
            Some(date) => Ok(Value::from(match op {
                "$year" => date.year() as i64,
                "$month" => date.month() as i64,
                _ => date.day() as i64,
            })),
            None => Ok(Value::Null),
        },
        other => Err(Error::InvalidPipeline(format!(
            "Unrecognized expression '{}'",
            other
        ))),
    }
}

fn eval_cond(raw: &Value, doc: &Document) -> Result<Value> {
    let (condition, then, otherwise) = match raw {
        Value::Array(items) if items.len() == 3 => (&items[0], &items[1], &items[2]),
        Value::Object(map) => match (map.get("if"), map.get("then"), map.get("else")) {
            (Some(c), Some(t), Some(e)) => (c, t, e),
            _ => {
                return Err(Error::InvalidPipeline(
                    "Missing 'if', 'then' or 'else' parameter to $cond".to_string(),
                ))
            }
        },
        _ => {
            return Err(Error::InvalidPipeline(
                "Expression $cond takes exactly 3 arguments".to_string(),
            ))
        }
    };
    if is_truthy(&eval(condition, doc)?) {
        eval(then, doc)
    } else {
        eval(otherwise, doc)
    }
}

fn negate(value: &Value) -> Value {
    match value.as_i64() {
        Some(i) => Value::from(-i),
        None => float_value(-value.as_f64().unwrap_or(0.0)),
    }
}

/// Numeric fold shared by expressions and `$group` accumulators.
///
/// Non-numeric values are ignored; `$avg`/`$max`/`$min` over nothing is null.
pub(crate) fn fold_numbers(op: &str, values: &[Value]) -> Value {
    let nums: Vec<&Value> = values.iter().filter(|v| v.is_number()).collect();
    match op {
        "$sum" => nums.iter().fold(Value::from(0), |acc, v| add_numbers(&acc, v)),
        "$avg" if nums.is_empty() => Value::Null,
        "$avg" => {
            let total: f64 = nums.iter().filter_map(|v| v.as_f64()).sum();
            float_value(total / nums.len() as f64)
        }
        "$max" => values
            .iter()
            .filter(|v| !v.is_null())
            .max_by(|a, b| compare_values(a, b))
            .cloned()
            .unwrap_or(Value::Null),
        _ => values
            .iter()
            .filter(|v| !v.is_null())
            .min_by(|a, b| compare_values(a, b))
            .cloned()
            .unwrap_or(Value::Null),
    }
}

/// Parse an RFC 3339 timestamp or a bare `YYYY-MM-DD` date.
pub(crate) fn parse_date(value: &Value) -> Option<NaiveDate> {
    let s = value.as_str()?;
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.date_naive())
        .ok()
        .or_else(|| NaiveDate::parse_from_str(s.get(..10)?, "%Y-%m-%d").ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use labcheck_core::into_document;
    use serde_json::json;

    fn run(expr: Value, d: Value) -> Result<Value> {
        eval(&expr, &into_document(d).unwrap())
    }

    #[test]
    fn test_field_paths_and_literals() {
        assert_eq!(run(json!("$a.b"), json!({"a": {"b": 3}})).unwrap(), json!(3));
        assert_eq!(run(json!("$missing"), json!({})).unwrap(), json!(null));
        assert_eq!(run(json!(7), json!({})).unwrap(), json!(7));
        assert_eq!(
            run(json!("$items.qty"), json!({"items": [{"qty": 1}, {"qty": 2}]})).unwrap(),
            json!([1, 2])
        );
    }

    #[test]
    fn test_arithmetic() {
        let d = json!({"price": 4.0, "qty": 3});
        assert_eq!(run(json!({"$multiply": ["$price", "$qty"]}), d.clone()).unwrap(), json!(12.0));
        assert_eq!(run(json!({"$subtract": ["$qty", 1]}), d.clone()).unwrap(), json!(2));
        assert_eq!(run(json!({"$divide": ["$price", 2]}), d.clone()).unwrap(), json!(2.0));
        assert!(run(json!({"$divide": ["$price", 0]}), d).is_err());
    }

    #[test]
    fn test_strings_and_dates() {
        let d = json!({"first": "Ada", "last": "Lovelace", "at": "2024-03-15T10:00:00Z"});
        assert_eq!(
            run(json!({"$concat": ["$first", " ", "$last"]}), d.clone()).unwrap(),
            json!("Ada Lovelace")
        );
        assert_eq!(run(json!({"$toUpper": "$first"}), d.clone()).unwrap(), json!("ADA"));
        assert_eq!(run(json!({"$year": "$at"}), d.clone()).unwrap(), json!(2024));
        assert_eq!(run(json!({"$month": "$at"}), d).unwrap(), json!(3));
    }

    #[test]
    fn test_cond_and_comparison() {
        let d = json!({"total": 120});
        let expr = json!({"$cond": {"if": {"$gte": ["$total", 100]}, "then": "large", "else": "small"}});
        assert_eq!(run(expr, d).unwrap(), json!("large"));
    }

    #[test]
    fn test_unknown_expression() {
        let err = run(json!({"$frobnicate": 1}), json!({})).unwrap_err();
        assert!(err.to_string().contains("Unrecognized expression"));
    }

    #[test]
    fn test_fold_numbers() {
        let values = vec![json!(1), json!(2.5), json!("x"), json!(null)];
        assert_eq!(fold_numbers("$sum", &values), json!(3.5));
        assert_eq!(fold_numbers("$avg", &values), json!(1.75));
        assert_eq!(fold_numbers("$avg", &[]), json!(null));
        assert_eq!(fold_numbers("$max", &[json!(3), json!(9)]), json!(9));
    }
}
