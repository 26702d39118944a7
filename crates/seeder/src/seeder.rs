//! Replace collections with a dataset's exact contents

use std::fmt;

use labcheck_core::Result;
use labcheck_store::DocumentStore;
use tracing::info;

use crate::dataset::Dataset;

/// What seeding did to one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSummary {
    /// Collection name
    pub name: String,
    /// Documents inserted
    pub inserted: u64,
    /// Names of the indexes created
    pub indexes: Vec<String>,
}

/// Result of [`Seeder::seed`], in seeding order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedSummary {
    /// Per-collection results
    pub collections: Vec<CollectionSummary>,
}

impl SeedSummary {
    /// Documents inserted across all collections.
    pub fn total_inserted(&self) -> u64 {
        self.collections.iter().map(|c| c.inserted).sum()
    }

    /// Inserted count for a collection, if it was seeded.
    pub fn inserted_into(&self, name: &str) -> Option<u64> {
        self.collections
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.inserted)
    }
}

impl fmt::Display for SeedSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in &self.collections {
            write!(f, "  {:<12} {:>4} documents", c.name, c.inserted)?;
            if !c.indexes.is_empty() {
                write!(f, "  indexes: {}", c.indexes.join(", "))?;
            }
            writeln!(f)?;
        }
        write!(f, "  total        {:>4} documents", self.total_inserted())
    }
}

/// Loads datasets into a store.
///
/// Seeding is idempotent: every seeded collection is dropped first, so
/// running it twice leaves the same documents and indexes.
pub struct Seeder;

impl Seeder {
    /// Drop, insert and index every collection of `dataset`, in order.
    ///
    /// # Errors
    ///
    /// The first store error (duplicate key, invalid geometry, bad index
    /// spec) stops seeding and is returned as is. Collections seeded before
    /// the failure keep their new contents.
    pub fn seed(store: &dyn DocumentStore, dataset: &Dataset) -> Result<SeedSummary> {
        let mut summary = SeedSummary::default();
        for seed in &dataset.collections {
            store.drop_collection(&seed.name)?;
            let inserted = if seed.documents.is_empty() {
                store.create_collection(&seed.name)?;
                0
            } else {
                store
                    .insert_many(&seed.name, seed.documents.clone())?
                    .inserted_count
            };

            let mut indexes = Vec::with_capacity(seed.indexes.len());
            for index in &seed.indexes {
                indexes.push(store.create_index(&seed.name, index.clone())?);
            }

            info!(
                target: "labcheck::seed",
                collection = %seed.name,
                inserted,
                indexes = indexes.len(),
                "Collection seeded"
            );
            summary.collections.push(CollectionSummary {
                name: seed.name.clone(),
                inserted,
                indexes,
            });
        }
        Ok(summary)
    }

    /// Drop every collection the dataset names. Returns how many existed.
    pub fn reset(store: &dyn DocumentStore, dataset: &Dataset) -> Result<usize> {
        let mut dropped = 0;
        for name in dataset.collection_names() {
            if store.drop_collection(name)? {
                dropped += 1;
            }
        }
        info!(target: "labcheck::seed", dropped, "Seeded collections dropped");
        Ok(dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::CollectionSeed;
    use labcheck_core::{into_document, Document, Error, IndexKind, IndexSpec};
    use labcheck_store::MemoryStore;
    use proptest::prelude::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        into_document(value).unwrap()
    }

    fn small() -> Dataset {
        Dataset::new(vec![
            CollectionSeed::new("stores", vec![doc(json!({"_id": "s1", "name": "A"})), doc(json!({"name": "B"}))])
                .with_index(IndexSpec::single("name", IndexKind::Ascending).unique()),
            CollectionSeed::new("empty", Vec::new()),
        ])
        .unwrap()
    }

    #[test]
    fn test_seed_inserts_and_indexes() {
        let store = MemoryStore::new();
        let summary = Seeder::seed(&store, &small()).unwrap();
        assert_eq!(summary.inserted_into("stores"), Some(2));
        assert_eq!(summary.inserted_into("empty"), Some(0));
        assert_eq!(summary.collections[0].indexes, vec!["name_1".to_string()]);
        assert_eq!(store.list_collections().unwrap(), vec!["empty", "stores"]);
    }

    #[test]
    fn test_seed_keeps_explicit_ids() {
        let store = MemoryStore::new();
        Seeder::seed(&store, &small()).unwrap();
        assert!(store.find_one("stores", &doc(json!({"_id": "s1"}))).unwrap().is_some());
    }

    #[test]
    fn test_seed_replaces_existing_contents() {
        let store = MemoryStore::new();
        store.insert_one("stores", doc(json!({"name": "stale"}))).unwrap();
        Seeder::seed(&store, &small()).unwrap();
        Seeder::seed(&store, &small()).unwrap();
        assert_eq!(store.count_documents("stores", &Document::new()).unwrap(), 2);
        assert!(store.find_one("stores", &doc(json!({"name": "stale"}))).unwrap().is_none());
    }

    #[test]
    fn test_seed_propagates_store_errors() {
        let store = MemoryStore::new();
        let dataset = Dataset::new(vec![CollectionSeed::new(
            "dupes",
            vec![doc(json!({"_id": 1})), doc(json!({"_id": 1}))],
        )])
        .unwrap();
        assert!(matches!(Seeder::seed(&store, &dataset), Err(Error::DuplicateKey { .. })));
    }

    #[test]
    fn test_reset_drops_seeded_collections() {
        let store = MemoryStore::new();
        Seeder::seed(&store, &small()).unwrap();
        store.insert_one("other", Document::new()).unwrap();
        assert_eq!(Seeder::reset(&store, &small()).unwrap(), 2);
        assert_eq!(store.list_collections().unwrap(), vec!["other"]);
    }

    #[test]
    fn test_summary_display() {
        let store = MemoryStore::new();
        let text = Seeder::seed(&store, &small()).unwrap().to_string();
        assert!(text.contains("stores"));
        assert!(text.contains("indexes: name_1"));
        assert!(text.ends_with("2 documents"));
    }

    proptest! {
        #[test]
        fn test_seeding_twice_keeps_counts(sizes in proptest::collection::vec(0usize..6, 1..4)) {
            let dataset = Dataset::new(
                sizes
                    .iter()
                    .enumerate()
                    .map(|(i, n)| {
                        CollectionSeed::new(
                            format!("c{}", i),
                            (0..*n).map(|k| doc(json!({"k": k}))).collect(),
                        )
                    })
                    .collect(),
            )
            .unwrap();
            let store = MemoryStore::new();
            Seeder::seed(&store, &dataset).unwrap();
            Seeder::seed(&store, &dataset).unwrap();
            for (i, n) in sizes.iter().enumerate() {
                let count = store.count_documents(&format!("c{}", i), &Document::new()).unwrap();
                prop_assert_eq!(count, *n as u64);
            }
        }
    }
}
