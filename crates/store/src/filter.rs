//! Query filter compilation and matching
//!
//! A filter document is compiled once into a [`Filter`] tree, which reports
//! malformed operators before any document is scanned, then evaluated per
//! document.
//!
//! ## Field semantics
//!
//! Field paths fan out across arrays (see [`labcheck_core::lookup_path`]), and
//! a condition holds when *any* reached value satisfies it. Array fields also
//! match when one of their elements does, so `{ tags: "espresso" }` finds
//! `{ tags: ["espresso", "milk"] }`.

use std::cmp::Ordering;

use labcheck_core::{lookup_path, Document, Error, Result, Value};
use regex::{Regex, RegexBuilder};

use crate::compare::{compare_values, same_bracket, values_equal};
use crate::geo::{GeoShape, Point};
use crate::text::TextSearch;

/// Per-collection context a filter needs at evaluation time.
#[derive(Debug, Default, Clone)]
pub(crate) struct MatchContext {
    /// Fields covered by the collection's text index
    pub text_fields: Option<Vec<String>>,
}

/// Compiled query filter.
#[derive(Debug, Clone)]
pub(crate) enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Nor(Vec<Filter>),
    Field { path: String, conditions: Vec<Condition> },
    Text(TextSearch),
}

/// `$near` / `$nearSphere` operand.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct NearQuery {
    pub point: Point,
    pub max_distance: Option<f64>,
    pub min_distance: Option<f64>,
}

/// A single condition applied to the values reached by a field path.
#[derive(Debug, Clone)]
pub(crate) enum Condition {
    Eq(Value),
    Ne(Value),
    Cmp(Ordering, bool, Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
    Exists(bool),
    Regex(Regex),
    Not(Vec<Condition>),
    Size(usize),
    All(Vec<Value>),
    ElemMatch(ElemMatch),
    Type(String),
    Near(NearQuery),
    GeoWithin(GeoShape),
}

/// `$elemMatch` operand: a sub-filter for documents or conditions for scalars.
#[derive(Debug, Clone)]
pub(crate) enum ElemMatch {
    Document(Box<Filter>),
    Scalar(Vec<Condition>),
}

impl Filter {
    /// Compile a filter document.
    pub(crate) fn compile(filter: &Document) -> Result<Filter> {
        let mut clauses = Vec::with_capacity(filter.len());
        for (key, value) in filter {
            let clause = match key.as_str() {
                "$and" => Filter::And(compile_list(key, value)?),
                "$or" => Filter::Or(compile_list(key, value)?),
                "$nor" => Filter::Nor(compile_list(key, value)?),
                "$text" => Filter::Text(TextSearch::parse(value)?),
                "$comment" => continue,
                op if op.starts_with('$') => {
                    return Err(Error::InvalidQuery(format!(
                        "unknown top level operator: {}",
                        op
                    )))
                }
                path => Filter::Field {
                    path: path.to_string(),
                    conditions: compile_conditions(value)?,
                },
            };
            clauses.push(clause);
        }
        Ok(match clauses.len() {
            1 => clauses.remove(0),
            _ => Filter::And(clauses),
        })
    }

    /// Evaluate against a document.
    pub(crate) fn matches(&self, doc: &Document, ctx: &MatchContext) -> bool {
        match self {
            Filter::And(parts) => parts.iter().all(|f| f.matches(doc, ctx)),
            Filter::Or(parts) => parts.iter().any(|f| f.matches(doc, ctx)),
            Filter::Nor(parts) => !parts.iter().any(|f| f.matches(doc, ctx)),
            Filter::Field { path, conditions } => {
                let values = lookup_path(doc, path);
                conditions.iter().all(|c| c.holds(&values))
            }
            Filter::Text(search) => match &ctx.text_fields {
                Some(fields) => search.matches(doc, fields),
                None => false,
            },
        }
    }

    /// The text search clause, if the filter has one.
    pub(crate) fn text_search(&self) -> Option<&TextSearch> {
        match self {
            Filter::Text(search) => Some(search),
            Filter::And(parts) => parts.iter().find_map(Filter::text_search),
            _ => None,
        }
    }

    /// The `$near` clause and the field it applies to, if any.
    pub(crate) fn near_clause(&self) -> Option<(&str, &NearQuery)> {
        match self {
            Filter::Field { path, conditions } => conditions.iter().find_map(|c| match c {
                Condition::Near(near) => Some((path.as_str(), near)),
                _ => None,
            }),
            Filter::And(parts) => parts.iter().find_map(Filter::near_clause),
            _ => None,
        }
    }
}

fn compile_list(op: &str, value: &Value) -> Result<Vec<Filter>> {
    let items = value
        .as_array()
        .filter(|items| !items.is_empty())
        .ok_or_else(|| Error::InvalidQuery(format!("{} must be a nonempty array", op)))?;
    items
        .iter()
        .map(|item| match item {
            Value::Object(map) => Filter::compile(map),
            _ => Err(Error::InvalidQuery(format!(
                "{} argument's entries must be objects",
                op
            ))),
        })
        .collect()
}

fn is_operator_document(value: &Value) -> bool {
    match value {
        Value::Object(map) => !map.is_empty() && map.keys().all(|k| k.starts_with('$')),
        _ => false,
    }
}

fn compile_conditions(value: &Value) -> Result<Vec<Condition>> {
    let map = match value {
        Value::Object(map) if is_operator_document(value) => map,
        _ => return Ok(vec![Condition::Eq(value.clone())]),
    };

    let mut conditions = Vec::new();
    for (op, operand) in map {
        let condition = match op.as_str() {
            "$eq" => Condition::Eq(operand.clone()),
            "$ne" => Condition::Ne(operand.clone()),
            "$gt" => Condition::Cmp(Ordering::Greater, false, operand.clone()),
            "$gte" => Condition::Cmp(Ordering::Greater, true, operand.clone()),
            "$lt" => Condition::Cmp(Ordering::Less, false, operand.clone()),
            "$lte" => Condition::Cmp(Ordering::Less, true, operand.clone()),
            "$in" => Condition::In(array_operand(op, operand)?),
            "$nin" => Condition::Nin(array_operand(op, operand)?),
            "$all" => Condition::All(array_operand(op, operand)?),
            "$exists" => Condition::Exists(crate::compare::is_truthy(operand)),
            "$regex" => Condition::Regex(compile_regex(operand, map.get("$options"))?),
            "$options" => {
                if !map.contains_key("$regex") {
                    return Err(Error::InvalidQuery("$options needs a $regex".to_string()));
                }
                continue;
            }
            "$not" => {
                if !is_operator_document(operand) {
                    return Err(Error::InvalidQuery("$not needs a regex or a document".to_string()));
                }
                Condition::Not(compile_conditions(operand)?)
            }
            "$size" => Condition::Size(
                operand
                    .as_u64()
                    .ok_or_else(|| Error::InvalidQuery("$size needs a number".to_string()))?
                    as usize,
            ),
            "$elemMatch" => Condition::ElemMatch(compile_elem_match(operand)?),
            "$type" => Condition::Type(
                operand
                    .as_str()
                    .ok_or_else(|| Error::InvalidQuery("$type needs a type name".to_string()))?
                    .to_string(),
            ),
            "$near" | "$nearSphere" => Condition::Near(compile_near(operand, map)?),
            "$maxDistance" | "$minDistance" => {
                if !map.contains_key("$near") && !map.contains_key("$nearSphere") {
                    return Err(Error::InvalidQuery(format!("{} requires $near", op)));
                }
                continue;
            }
            "$geoWithin" => Condition::GeoWithin(GeoShape::parse(operand)?),
            other => return Err(Error::unknown_operator(other)),
        };
        conditions.push(condition);
    }
    Ok(conditions)
}

fn array_operand(op: &str, operand: &Value) -> Result<Vec<Value>> {
    operand
        .as_array()
        .cloned()
        .ok_or_else(|| Error::InvalidQuery(format!("{} needs an array", op)))
}

fn compile_regex(pattern: &Value, options: Option<&Value>) -> Result<Regex> {
    let pattern = pattern
        .as_str()
        .ok_or_else(|| Error::InvalidQuery("$regex has to be a string".to_string()))?;
    let options = options.and_then(Value::as_str).unwrap_or("");
    RegexBuilder::new(pattern)
        .case_insensitive(options.contains('i'))
        .multi_line(options.contains('m'))
        .dot_matches_new_line(options.contains('s'))
        .build()
        .map_err(|e| Error::InvalidQuery(format!("Regular expression is invalid: {}", e)))
}

fn compile_elem_match(operand: &Value) -> Result<ElemMatch> {
    match operand {
        Value::Object(map) if is_operator_document(operand) => {
            // `{ $elemMatch: { $gte: 80 } }` applies to scalar elements, but
            // logical operators still describe documents
            if map.keys().any(|k| matches!(k.as_str(), "$and" | "$or" | "$nor")) {
                Ok(ElemMatch::Document(Box::new(Filter::compile(map)?)))
            } else {
                Ok(ElemMatch::Scalar(compile_conditions(operand)?))
            }
        }
        Value::Object(map) => Ok(ElemMatch::Document(Box::new(Filter::compile(map)?))),
        _ => Err(Error::InvalidQuery("$elemMatch needs an Object".to_string())),
    }
}

fn compile_near(operand: &Value, siblings: &labcheck_core::Map<String, Value>) -> Result<NearQuery> {
    let distance = |v: Option<&Value>, name: &str| -> Result<Option<f64>> {
        match v {
            None => Ok(None),
            Some(v) => v
                .as_f64()
                .filter(|d| *d >= 0.0)
                .map(Some)
                .ok_or_else(|| Error::InvalidQuery(format!("{} must be a non-negative number", name))),
        }
    };

    let (point, inner) = match operand {
        Value::Object(map) if map.contains_key("$geometry") => {
            let point = Point::parse(&map["$geometry"])
                .map_err(|e| Error::InvalidQuery(format!("invalid point in geo near query: {}", e)))?;
            (point, Some(map))
        }
        other => (
            Point::parse(other)
                .map_err(|e| Error::InvalidQuery(format!("invalid point in geo near query: {}", e)))?,
            None,
        ),
    };

    let max_distance = distance(
        inner
            .and_then(|m| m.get("$maxDistance"))
            .or_else(|| siblings.get("$maxDistance")),
        "$maxDistance",
    )?;
    let min_distance = distance(
        inner
            .and_then(|m| m.get("$minDistance"))
            .or_else(|| siblings.get("$minDistance")),
        "$minDistance",
    )?;

    Ok(NearQuery {
        point,
        max_distance,
        min_distance,
    })
}

/// Reached values plus the elements of reached arrays.
fn expand<'a>(values: &[&'a Value]) -> Vec<&'a Value> {
    let mut out = Vec::with_capacity(values.len());
    for value in values {
        out.push(*value);
        if let Value::Array(items) = value {
            out.extend(items.iter());
        }
    }
    out
}

fn type_matches(value: &Value, name: &str) -> bool {
    match name {
        "null" => value.is_null(),
        "bool" => value.is_boolean(),
        "string" => value.is_string(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "number" => value.is_number(),
        "int" | "long" => value.is_i64() || value.is_u64(),
        "double" => value.is_f64(),
        _ => false,
    }
}

impl Condition {
    /// Evaluate against the values a field path reached.
    pub(crate) fn holds(&self, values: &[&Value]) -> bool {
        match self {
            Condition::Eq(target) => eq_holds(values, target),
            Condition::Ne(target) => !eq_holds(values, target),
            Condition::Cmp(direction, inclusive, target) => expand(values).iter().any(|v| {
                if !same_bracket(v, target) {
                    return false;
                }
                let ord = compare_values(v, target);
                ord == *direction || (*inclusive && ord == Ordering::Equal)
            }),
            Condition::In(targets) => targets.iter().any(|t| eq_holds(values, t)),
            Condition::Nin(targets) => !targets.iter().any(|t| eq_holds(values, t)),
            Condition::Exists(expected) => !values.is_empty() == *expected,
            Condition::Regex(re) => expand(values)
                .iter()
                .any(|v| v.as_str().map(|s| re.is_match(s)).unwrap_or(false)),
            Condition::Not(inner) => !inner.iter().all(|c| c.holds(values)),
            Condition::Size(n) => values
                .iter()
                .any(|v| v.as_array().map(|a| a.len() == *n).unwrap_or(false)),
            Condition::All(targets) => {
                !targets.is_empty() && targets.iter().all(|t| eq_holds(values, t))
            }
            Condition::ElemMatch(elem) => values.iter().any(|v| match v {
                Value::Array(items) => items.iter().any(|item| elem.holds(item)),
                _ => false,
            }),
            Condition::Type(name) => values.iter().any(|v| type_matches(v, name)),
            Condition::Near(near) => values.first().map_or(false, |v| near.holds(v)),
            Condition::GeoWithin(shape) => values.iter().any(|v| {
                Point::parse(v)
                    .map(|p| shape.contains(&p))
                    .unwrap_or(false)
            }),
        }
    }
}

impl ElemMatch {
    fn holds(&self, item: &Value) -> bool {
        match self {
            ElemMatch::Document(filter) => match item {
                Value::Object(doc) => filter.matches(doc, &MatchContext::default()),
                _ => false,
            },
            ElemMatch::Scalar(conditions) => conditions.iter().all(|c| c.holds(&[item])),
        }
    }
}

impl NearQuery {
    /// Distance in metres from the query point, if the value is a point.
    pub(crate) fn distance(&self, value: &Value) -> Option<f64> {
        Point::parse(value).ok().map(|p| self.point.distance_to(&p))
    }

    fn holds(&self, value: &Value) -> bool {
        match self.distance(value) {
            Some(d) => {
                self.max_distance.map_or(true, |max| d <= max)
                    && self.min_distance.map_or(true, |min| d >= min)
            }
            None => false,
        }
    }
}

fn eq_holds(values: &[&Value], target: &Value) -> bool {
    if target.is_null() && values.is_empty() {
        return true;
    }
    values.iter().any(|v| {
        values_equal(v, target)
            || matches!(v, Value::Array(items) if items.iter().any(|i| values_equal(i, target)))
    })
}
