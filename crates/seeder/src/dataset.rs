//! Seed dataset description
//!
//! A [`Dataset`] is an ordered list of collections, each with the exact
//! documents to insert and the indexes to declare afterwards. The JSON form
//! is what `labcheck seed --dataset <file>` reads:
//!
//! ```json
//! {
//!   "collections": [
//!     {
//!       "name": "stores",
//!       "documents": [{ "_id": "store-001", "name": "Downtown" }],
//!       "indexes": [{ "keys": { "location": "2dsphere" } }]
//!     }
//!   ]
//! }
//! ```

use std::collections::HashSet;
use std::path::Path;

use labcheck_core::{Document, Error, IndexSpec, Result};
use serde::{Deserialize, Serialize};

/// Documents and indexes for one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSeed {
    /// Collection name
    pub name: String,
    /// Documents inserted in order; explicit `_id`s are kept
    #[serde(default)]
    pub documents: Vec<Document>,
    /// Indexes created after the documents are inserted
    #[serde(default)]
    pub indexes: Vec<IndexSpec>,
}

impl CollectionSeed {
    /// Create a seed with no indexes.
    pub fn new(name: impl Into<String>, documents: Vec<Document>) -> Self {
        CollectionSeed {
            name: name.into(),
            documents,
            indexes: Vec::new(),
        }
    }

    /// Declare an index on this collection.
    pub fn with_index(mut self, index: IndexSpec) -> Self {
        self.indexes.push(index);
        self
    }
}

/// An ordered set of collection seeds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// Collections, seeded in this order
    pub collections: Vec<CollectionSeed>,
}

impl Dataset {
    /// Build a dataset, rejecting repeated collection names.
    pub fn new(collections: Vec<CollectionSeed>) -> Result<Self> {
        let dataset = Dataset { collections };
        dataset.validate()?;
        Ok(dataset)
    }

    /// Parse a dataset from JSON text.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let dataset: Dataset = serde_json::from_str(content)
            .map_err(|e| Error::Serialization(format!("invalid dataset: {}", e)))?;
        dataset.validate()?;
        Ok(dataset)
    }

    /// Load a dataset from a JSON file.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read, is not a valid dataset, or names
    /// a collection twice.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
            .map_err(|e| Error::Serialization(format!("{}: {}", path.display(), e)))
    }

    /// Combine two datasets, keeping `self`'s collections first.
    pub fn merge(mut self, other: Dataset) -> Result<Self> {
        self.collections.extend(other.collections);
        self.validate()?;
        Ok(self)
    }

    /// Collection names in seeding order.
    pub fn collection_names(&self) -> Vec<&str> {
        self.collections.iter().map(|c| c.name.as_str()).collect()
    }

    /// Total number of documents across collections.
    pub fn document_count(&self) -> usize {
        self.collections.iter().map(|c| c.documents.len()).sum()
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for collection in &self.collections {
            if collection.name.is_empty() {
                return Err(Error::Serialization(
                    "dataset collection name must not be empty".to_string(),
                ));
            }
            if !seen.insert(collection.name.as_str()) {
                return Err(Error::Serialization(format!(
                    "dataset names collection '{}' more than once",
                    collection.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_dataset() {
        let dataset = Dataset::from_json_str(
            r#"{"collections": [
                {"name": "stores", "documents": [{"_id": 1}], "indexes": [{"keys": {"location": "2dsphere"}}]},
                {"name": "empty"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(dataset.collection_names(), vec!["stores", "empty"]);
        assert_eq!(dataset.document_count(), 1);
        assert_eq!(dataset.collections[0].indexes[0].resolved_name().unwrap(), "location_2dsphere");
    }

    #[test]
    fn test_rejects_duplicate_collection() {
        let err = Dataset::from_json_str(r#"{"collections": [{"name": "a"}, {"name": "a"}]}"#).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(Dataset::from_json_str("{\"collections\": 5}").is_err());
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, r#"{"collections": [{"name": "a", "documents": [{}, {}]}]}"#).unwrap();
        assert_eq!(Dataset::from_json_file(&path).unwrap().document_count(), 2);
        assert!(Dataset::from_json_file(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_merge_keeps_order_and_rejects_overlap() {
        let a = Dataset::new(vec![CollectionSeed::new("a", Vec::new())]).unwrap();
        let b = Dataset::new(vec![CollectionSeed::new("b", Vec::new())]).unwrap();
        let merged = a.clone().merge(b).unwrap();
        assert_eq!(merged.collection_names(), vec!["a", "b"]);
        assert!(merged.merge(a).is_err());
    }
}
