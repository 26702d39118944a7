//! Shared test utilities for the integration suites.

#![allow(dead_code)]

use std::path::PathBuf;

use labcheck::{course, DocumentStore, MemoryStore, Seeder};
use tempfile::TempDir;

/// In-memory store holding the course dataset.
pub fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new();
    Seeder::seed(&store, course()).expect("course seeds cleanly");
    store
}

/// Snapshot path inside a fresh temp dir; keep the dir alive while using it.
pub fn temp_data_file() -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("nested").join("store.json");
    (dir, path)
}

/// Document count per collection, in name order.
pub fn counts(store: &dyn DocumentStore) -> Vec<(String, u64)> {
    store
        .list_collections()
        .expect("list collections")
        .into_iter()
        .map(|name| {
            let n = store
                .count_documents(&name, &Default::default())
                .expect("count");
            (name, n)
        })
        .collect()
}
