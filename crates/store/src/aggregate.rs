//! Aggregation pipeline, plus the sort and projection helpers `find` shares.
//!
//! A pipeline is parsed into [`Stage`]s before any document flows through
//! it, so an unknown stage fails even against an empty collection.

use labcheck_core::{get_path, lookup_path, remove_path, set_path, Document, Error, Result, Value, ID_FIELD};

use crate::compare::{compare_values, is_truthy, values_equal};
use crate::expr::{eval, fold_numbers};
use crate::filter::{Filter, MatchContext};
use crate::geo::Point;

static NULL: Value = Value::Null;

/// Collection facts a pipeline needs while running.
pub(crate) struct PipelineContext<'a> {
    /// Text index fields for `$match` with `$text`
    pub match_ctx: MatchContext,
    /// Fields covered by `2dsphere` indexes, for `$geoNear`
    pub geo_fields: Vec<String>,
    /// Loads the documents of another collection, for `$lookup`
    pub lookup: &'a dyn Fn(&str) -> Vec<Document>,
}

#[derive(Debug)]
enum Stage {
    Match(Filter),
    Project(Document),
    AddFields(Document),
    Unset(Vec<String>),
    Group { id: Value, accumulators: Vec<(String, String, Value)> },
    Sort(Document),
    Limit(usize),
    Skip(usize),
    Count(String),
    Unwind { path: String, preserve_empty: bool },
    Lookup { from: String, local: String, foreign: String, as_field: String },
    GeoNear(GeoNearSpec),
    SortByCount(Value),
}

#[derive(Debug)]
struct GeoNearSpec {
    near: Point,
    distance_field: String,
    max_distance: Option<f64>,
    min_distance: Option<f64>,
    query: Option<Filter>,
    key: Option<String>,
}

const ACCUMULATORS: &[&str] = &[
    "$sum", "$avg", "$min", "$max", "$first", "$last", "$push", "$addToSet", "$count",
];

fn pipeline_error(msg: impl Into<String>) -> Error {
    Error::InvalidPipeline(msg.into())
}

fn stage_object<'a>(name: &str, spec: &'a Value) -> Result<&'a Document> {
    spec.as_object()
        .ok_or_else(|| pipeline_error(format!("{} specification must be an object", name)))
}

fn stage_string<'a>(name: &str, spec: &'a Value) -> Result<&'a str> {
    spec.as_str()
        .ok_or_else(|| pipeline_error(format!("{} requires a string argument", name)))
}

fn positive(name: &str, spec: &Value) -> Result<usize> {
    match spec.as_u64() {
        Some(n) if n > 0 || name == "$skip" => Ok(n as usize),
        _ => Err(pipeline_error(format!(
            "invalid argument to {} stage: Expected a positive number",
            name
        ))),
    }
}

impl Stage {
    fn parse(stage: &Document, position: usize) -> Result<Stage> {
        let (name, spec) = match stage.iter().next() {
            Some(entry) if stage.len() == 1 => entry,
            _ => {
                return Err(pipeline_error(
                    "A pipeline stage specification object must contain exactly one field.",
                ))
            }
        };
        Ok(match name.as_str() {
            "$match" => Stage::Match(Filter::compile(stage_object(name, spec)?)?),
            "$project" => Stage::Project(stage_object(name, spec)?.clone()),
            "$addFields" | "$set" => Stage::AddFields(stage_object(name, spec)?.clone()),
            "$unset" => Stage::Unset(match spec {
                Value::String(s) => vec![s.clone()],
                Value::Array(items) => items
                    .iter()
                    .map(|i| stage_string(name, i).map(str::to_string))
                    .collect::<Result<_>>()?,
                _ => return Err(pipeline_error("$unset specification must be a string or an array")),
            }),
            "$group" => parse_group(stage_object(name, spec)?)?,
            "$sort" => Stage::Sort(stage_object(name, spec)?.clone()),
            "$limit" => Stage::Limit(positive(name, spec)?),
            "$skip" => Stage::Skip(positive(name, spec)?),
            "$count" => {
                let field = stage_string(name, spec)?;
                if field.is_empty() || field.starts_with('$') || field.contains('.') {
                    return Err(pipeline_error(
                        "the count field must be a non-empty string without '$' or '.'",
                    ));
                }
                Stage::Count(field.to_string())
            }
            "$unwind" => {
                let (path, preserve_empty) = match spec {
                    Value::String(s) => (s.as_str(), false),
                    Value::Object(map) => (
                        map.get("path").and_then(Value::as_str).unwrap_or(""),
                        map.get("preserveNullAndEmptyArrays")
                            .map(is_truthy)
                            .unwrap_or(false),
                    ),
                    _ => return Err(pipeline_error("expected either a string or an object as specification for $unwind stage")),
                };
                let path = path.strip_prefix('$').ok_or_else(|| {
                    pipeline_error("path option to $unwind stage should be prefixed with a '$'")
                })?;
                Stage::Unwind {
                    path: path.to_string(),
                    preserve_empty,
                }
            }
            "$lookup" => {
                let map = stage_object(name, spec)?;
                let field = |key: &str| -> Result<String> {
                    map.get(key)
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .ok_or_else(|| pipeline_error(format!("$lookup requires '{}' as a string", key)))
                };
                Stage::Lookup {
                    from: field("from")?,
                    local: field("localField")?,
                    foreign: field("foreignField")?,
                    as_field: field("as")?,
                }
            }
            "$geoNear" => {
                if position != 0 {
                    return Err(pipeline_error(
                        "$geoNear is only valid as the first stage in a pipeline",
                    ));
                }
                Stage::GeoNear(parse_geo_near(stage_object(name, spec)?)?)
            }
            "$sortByCount" => Stage::SortByCount(spec.clone()),
            other => {
                return Err(pipeline_error(format!(
                    "Unrecognized pipeline stage name: '{}'",
                    other
                )))
            }
        })
    }
}

fn parse_group(spec: &Document) -> Result<Stage> {
    let id = spec
        .get(ID_FIELD)
        .cloned()
        .ok_or_else(|| pipeline_error("a group specification must include an _id"))?;
    let mut accumulators = Vec::new();
    for (field, acc) in spec.iter().filter(|(k, _)| k.as_str() != ID_FIELD) {
        let (op, expr) = acc
            .as_object()
            .filter(|m| m.len() == 1)
            .and_then(|m| m.iter().next())
            .ok_or_else(|| pipeline_error(format!("The field '{}' must be an accumulator object", field)))?;
        if !ACCUMULATORS.contains(&op.as_str()) {
            return Err(pipeline_error(format!("unknown group operator '{}'", op)));
        }
        accumulators.push((field.clone(), op.clone(), expr.clone()));
    }
    Ok(Stage::Group { id, accumulators })
}

fn parse_geo_near(spec: &Document) -> Result<GeoNearSpec> {
    let near = spec
        .get("near")
        .ok_or_else(|| pipeline_error("$geoNear requires a 'near' option"))
        .and_then(|v| Point::parse(v).map_err(|e| pipeline_error(format!("invalid 'near' point: {}", e))))?;
    let distance_field = spec
        .get("distanceField")
        .and_then(Value::as_str)
        .ok_or_else(|| pipeline_error("$geoNear requires a 'distanceField' option as a String"))?
        .to_string();
    let query = match spec.get("query") {
        Some(Value::Object(q)) => Some(Filter::compile(q)?),
        Some(_) => return Err(pipeline_error("$geoNear 'query' must be an object")),
        None => None,
    };
    Ok(GeoNearSpec {
        near,
        distance_field,
        max_distance: spec.get("maxDistance").and_then(Value::as_f64),
        min_distance: spec.get("minDistance").and_then(Value::as_f64),
        query,
        key: spec.get("key").and_then(Value::as_str).map(str::to_string),
    })
}

/// Run a pipeline over the documents of one collection.
pub(crate) fn run_pipeline(
    docs: Vec<Document>,
    pipeline: &[Document],
    ctx: &PipelineContext<'_>,
) -> Result<Vec<Document>> {
    let stages = pipeline
        .iter()
        .enumerate()
        .map(|(i, stage)| Stage::parse(stage, i))
        .collect::<Result<Vec<_>>>()?;

    let mut docs = docs;
    for stage in &stages {
        docs = apply_stage(docs, stage, ctx)?;
    }
    Ok(docs)
}

fn apply_stage(docs: Vec<Document>, stage: &Stage, ctx: &PipelineContext<'_>) -> Result<Vec<Document>> {
    match stage {
        Stage::Match(filter) => {
            if filter.text_search().is_some() && ctx.match_ctx.text_fields.is_none() {
                return Err(Error::IndexNotFound("text index required for $text query".to_string()));
            }
            Ok(docs
                .into_iter()
                .filter(|d| filter.matches(d, &ctx.match_ctx))
                .collect())
        }
        Stage::Project(spec) => docs.iter().map(|d| apply_projection(d, spec)).collect(),
        Stage::AddFields(spec) => docs
            .into_iter()
            .map(|mut d| {
                for (field, expr) in spec {
                    let value = eval(expr, &d)?;
                    set_path(&mut d, field, value)?;
                }
                Ok(d)
            })
            .collect(),
        Stage::Unset(fields) => Ok(docs
            .into_iter()
            .map(|mut d| {
                for field in fields {
                    remove_path(&mut d, field);
                }
                d
            })
            .collect()),
        Stage::Group { id, accumulators } => group(docs, id, accumulators),
        Stage::Sort(spec) => {
            let mut docs = docs;
            sort_documents(&mut docs, spec)?;
            Ok(docs)
        }
        Stage::Limit(n) => Ok(docs.into_iter().take(*n).collect()),
        Stage::Skip(n) => Ok(docs.into_iter().skip(*n).collect()),
        Stage::Count(field) => {
            if docs.is_empty() {
                return Ok(Vec::new());
            }
            let mut out = Document::new();
            out.insert(field.clone(), Value::from(docs.len()));
            Ok(vec![out])
        }
        Stage::Unwind { path, preserve_empty } => Ok(unwind(docs, path, *preserve_empty)),
        Stage::Lookup {
            from,
            local,
            foreign,
            as_field,
        } => {
            let foreign_docs = (ctx.lookup)(from);
            docs.into_iter()
                .map(|mut d| {
                    let local_value = get_path(&d, local).cloned().unwrap_or(Value::Null);
                    let joined: Vec<Value> = foreign_docs
                        .iter()
                        .filter(|f| join_matches(&local_value, f, foreign))
                        .cloned()
                        .map(Value::Object)
                        .collect();
                    set_path(&mut d, as_field, Value::Array(joined))?;
                    Ok(d)
                })
                .collect()
        }
        Stage::GeoNear(spec) => geo_near(docs, spec, ctx),
        Stage::SortByCount(expr) => {
            let mut counted = group(docs, expr, &[("count".to_string(), "$sum".to_string(), Value::from(1))])?;
            counted.sort_by(|a, b| compare_values(&b["count"], &a["count"]));
            Ok(counted)
        }
    }
}

fn join_matches(local: &Value, foreign_doc: &Document, foreign_field: &str) -> bool {
    let candidates = lookup_path(foreign_doc, foreign_field);
    let locals: Vec<&Value> = match local {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    if candidates.is_empty() {
        return locals.iter().any(|l| l.is_null());
    }
    candidates.iter().any(|c| {
        locals.iter().any(|l| {
            values_equal(c, l)
                || matches!(c, Value::Array(items) if items.iter().any(|i| values_equal(i, l)))
        })
    })
}

fn group(docs: Vec<Document>, id: &Value, accumulators: &[(String, String, Value)]) -> Result<Vec<Document>> {
    let mut groups: Vec<(Value, Vec<Vec<Value>>)> = Vec::new();
    for doc in &docs {
        let key = eval(id, doc)?;
        let index = match groups.iter().position(|(k, _)| values_equal(k, &key)) {
            Some(i) => i,
            None => {
                groups.push((key, vec![Vec::new(); accumulators.len()]));
                groups.len() - 1
            }
        };
        for (slot, (_, op, expr)) in accumulators.iter().enumerate() {
            let value = if op == "$count" {
                Value::from(1)
            } else {
                eval(expr, doc)?
            };
            groups[index].1[slot].push(value);
        }
    }

    Ok(groups
        .into_iter()
        .map(|(key, collected)| {
            let mut out = Document::new();
            out.insert(ID_FIELD.to_string(), key);
            for ((field, op, _), values) in accumulators.iter().zip(collected) {
                out.insert(field.clone(), finalize(op, values));
            }
            out
        })
        .collect())
}

fn finalize(op: &str, values: Vec<Value>) -> Value {
    match op {
        "$first" => values.into_iter().next().unwrap_or(Value::Null),
        "$last" => values.into_iter().last().unwrap_or(Value::Null),
        "$push" => Value::Array(values),
        "$addToSet" => {
            let mut set: Vec<Value> = Vec::new();
            for v in values {
                if !set.iter().any(|s| values_equal(s, &v)) {
                    set.push(v);
                }
            }
            Value::Array(set)
        }
        "$count" => Value::from(values.len()),
        numeric => fold_numbers(numeric, &values),
    }
}

fn unwind(docs: Vec<Document>, path: &str, preserve_empty: bool) -> Vec<Document> {
    let mut out = Vec::new();
    for doc in docs {
        match get_path(&doc, path) {
            Some(Value::Array(items)) if !items.is_empty() => {
                for item in items.clone() {
                    let mut copy = doc.clone();
                    // The path resolved to an array, so setting it cannot fail
                    if set_path(&mut copy, path, item).is_ok() {
                        out.push(copy);
                    }
                }
            }
            Some(Value::Array(_)) | Some(Value::Null) | None => {
                if preserve_empty {
                    out.push(doc);
                }
            }
            Some(_) => out.push(doc),
        }
    }
    out
}

fn geo_near(docs: Vec<Document>, spec: &GeoNearSpec, ctx: &PipelineContext<'_>) -> Result<Vec<Document>> {
    let field = match (&spec.key, ctx.geo_fields.as_slice()) {
        (_, []) => {
            return Err(Error::IndexNotFound(
                "$geoNear requires a 2d or 2dsphere index, but none were found".to_string(),
            ))
        }
        (Some(key), fields) if fields.contains(key) => key.clone(),
        (Some(key), _) => {
            return Err(Error::IndexNotFound(format!(
                "no 2dsphere index on '{}' for $geoNear",
                key
            )))
        }
        (None, [only]) => only.clone(),
        (None, _) => {
            return Err(pipeline_error(
                "more than one 2dsphere index, use the 'key' option to choose one",
            ))
        }
    };

    let mut ranked: Vec<(f64, Document)> = docs
        .into_iter()
        .filter(|d| spec.query.as_ref().map_or(true, |q| q.matches(d, &ctx.match_ctx)))
        .filter_map(|d| {
            let point = get_path(&d, &field).and_then(|v| Point::parse(v).ok())?;
            Some((spec.near.distance_to(&point), d))
        })
        .filter(|(dist, _)| {
            spec.max_distance.map_or(true, |m| *dist <= m) && spec.min_distance.map_or(true, |m| *dist >= m)
        })
        .collect();
    ranked.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    ranked
        .into_iter()
        .map(|(dist, mut d)| {
            set_path(&mut d, &spec.distance_field, crate::update::float_value(dist))?;
            Ok(d)
        })
        .collect()
}

/// Sort documents in place by a `{ field: 1 | -1 }` specification.
pub(crate) fn sort_documents(docs: &mut [Document], spec: &Document) -> Result<()> {
    let mut keys = Vec::with_capacity(spec.len());
    for (field, direction) in spec {
        let descending = match direction.as_i64() {
            Some(1) => false,
            Some(-1) => true,
            _ => {
                return Err(Error::InvalidQuery(
                    "$sort key ordering must be 1 (for ascending) or -1 (for descending)".to_string(),
                ))
            }
        };
        keys.push((field.as_str(), descending));
    }
    docs.sort_by(|a, b| {
        for (field, descending) in &keys {
            let left = get_path(a, field).unwrap_or(&NULL);
            let right = get_path(b, field).unwrap_or(&NULL);
            let ord = compare_values(left, right);
            let ord = if *descending { ord.reverse() } else { ord };
            if ord.is_ne() {
                return ord;
            }
        }
        std::cmp::Ordering::Equal
    });
    Ok(())
}

/// Apply an inclusion, exclusion or computed projection.
pub(crate) fn apply_projection(doc: &Document, spec: &Document) -> Result<Document> {
    let mut include_id = true;
    let mut inclusions = Vec::new();
    let mut exclusions = Vec::new();
    let mut computed = Vec::new();

    for (field, value) in spec {
        match value {
            Value::Bool(_) | Value::Number(_) => {
                if field == ID_FIELD {
                    include_id = is_truthy(value);
                } else if is_truthy(value) {
                    inclusions.push(field);
                } else {
                    exclusions.push(field);
                }
            }
            expr => computed.push((field, expr)),
        }
    }

    if inclusions.is_empty() && computed.is_empty() {
        let mut out = doc.clone();
        for field in exclusions {
            remove_path(&mut out, field);
        }
        if !include_id {
            out.remove(ID_FIELD);
        }
        return Ok(out);
    }

    if let Some(field) = exclusions.first() {
        return Err(Error::InvalidQuery(format!(
            "Cannot do exclusion on field {} in inclusion projection",
            field
        )));
    }

    let mut out = Document::new();
    if include_id {
        if let Some(id) = doc.get(ID_FIELD) {
            out.insert(ID_FIELD.to_string(), id.clone());
        }
    }
    for field in inclusions {
        if let Some(value) = get_path(doc, field) {
            set_path(&mut out, field, value.clone())?;
        }
    }
    for (field, expr) in computed {
        let value = eval(expr, doc)?;
        set_path(&mut out, field, value)?;
    }
    Ok(out)
}
