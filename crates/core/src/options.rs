//! Option and specification types passed to store operations.

use serde::{Deserialize, Serialize};

use crate::document::{Document, Value};
use crate::error::{Error, Result};

/// Options for `find`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindOptions {
    /// Sort specification, e.g. `{ "price": -1 }`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<Document>,
    /// Number of matching documents to skip
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<usize>,
    /// Maximum number of documents to return
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Inclusion or exclusion projection, e.g. `{ "name": 1, "_id": 0 }`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projection: Option<Document>,
}

impl FindOptions {
    /// Create empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sort specification.
    pub fn sort(mut self, sort: Document) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Set the skip count.
    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Set the result limit.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the projection.
    pub fn projection(mut self, projection: Document) -> Self {
        self.projection = Some(projection);
        self
    }
}

/// Options for `update_one` / `update_many`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOptions {
    /// Insert a new document when nothing matches
    #[serde(default)]
    pub upsert: bool,
}

impl UpdateOptions {
    /// Options with upsert enabled.
    pub fn upsert() -> Self {
        UpdateOptions { upsert: true }
    }
}

/// Kind of a single index key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexKind {
    /// Ascending B-tree key (`1`)
    Ascending,
    /// Descending B-tree key (`-1`)
    Descending,
    /// Spherical geospatial key (`"2dsphere"`)
    Geo2dSphere,
    /// Full-text key (`"text"`)
    Text,
}

impl IndexKind {
    fn parse(field: &str, value: &Value) -> Result<Self> {
        match value {
            Value::Number(n) if n.as_f64() == Some(1.0) => Ok(IndexKind::Ascending),
            Value::Number(n) if n.as_f64() == Some(-1.0) => Ok(IndexKind::Descending),
            Value::String(s) if s == "2dsphere" => Ok(IndexKind::Geo2dSphere),
            Value::String(s) if s == "text" => Ok(IndexKind::Text),
            other => Err(Error::InvalidQuery(format!(
                "Values in the index key pattern can only be 1, -1, \"2dsphere\" or \"text\": {}: {}",
                field, other
            ))),
        }
    }

    fn suffix(&self) -> &'static str {
        match self {
            IndexKind::Ascending => "1",
            IndexKind::Descending => "-1",
            IndexKind::Geo2dSphere => "2dsphere",
            IndexKind::Text => "text",
        }
    }
}

/// Declared index: a key pattern plus naming and uniqueness options.
///
/// The key pattern is kept in its document form (`{ "location": "2dsphere" }`)
/// so seed files can declare indexes exactly as the course writes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Key pattern, e.g. `{ "name": "text", "description": "text" }`
    pub keys: Document,
    /// Explicit index name; derived from the key pattern when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Reject documents whose key duplicates an existing one
    #[serde(default)]
    pub unique: bool,
}

impl IndexSpec {
    /// Create a spec from a key pattern.
    pub fn new(keys: Document) -> Self {
        IndexSpec {
            keys,
            name: None,
            unique: false,
        }
    }

    /// Shorthand for a single-field index.
    pub fn single(field: &str, kind: IndexKind) -> Self {
        let value = match kind {
            IndexKind::Ascending => Value::from(1),
            IndexKind::Descending => Value::from(-1),
            IndexKind::Geo2dSphere => Value::from("2dsphere"),
            IndexKind::Text => Value::from("text"),
        };
        let mut keys = Document::new();
        keys.insert(field.to_string(), value);
        IndexSpec::new(keys)
    }

    /// Mark the index unique.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Give the index an explicit name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Parse the key pattern into `(field, kind)` pairs.
    ///
    /// # Errors
    ///
    /// Fails on an empty pattern or an unsupported key value.
    pub fn fields(&self) -> Result<Vec<(String, IndexKind)>> {
        if self.keys.is_empty() {
            return Err(Error::InvalidQuery(
                "Index keys cannot be an empty object".to_string(),
            ));
        }
        self.keys
            .iter()
            .map(|(field, value)| Ok((field.clone(), IndexKind::parse(field, value)?)))
            .collect()
    }

    /// Index name, explicit or derived (`price_1`, `location_2dsphere`).
    pub fn resolved_name(&self) -> Result<String> {
        if let Some(name) = &self.name {
            return Ok(name.clone());
        }
        Ok(self
            .fields()?
            .iter()
            .map(|(field, kind)| format!("{}_{}", field, kind.suffix()))
            .collect::<Vec<_>>()
            .join("_"))
    }

    /// Whether any key of this index has the given kind.
    pub fn has_kind(&self, kind: IndexKind) -> bool {
        self.fields()
            .map(|fields| fields.iter().any(|(_, k)| *k == kind))
            .unwrap_or(false)
    }
}
