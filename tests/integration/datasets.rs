//! Custom dataset files and reseeding.

use labcheck::{course, Dataset, DocumentStore, MemoryStore, Seeder};
use tempfile::TempDir;

use crate::common::{counts, seeded_store};

const CAFE_DATASET: &str = r#"{
  "collections": [
    {
      "name": "cafes",
      "documents": [
        { "_id": "cafe-1", "name": "Bean There", "location": { "type": "Point", "coordinates": [-97.74, 30.27] } },
        { "_id": "cafe-2", "name": "Grounds Up", "location": { "type": "Point", "coordinates": [-97.70, 30.30] } }
      ],
      "indexes": [{ "keys": { "location": "2dsphere" } }, { "keys": { "name": 1 }, "unique": true }]
    },
    { "name": "visits" }
  ]
}"#;

#[test]
fn test_custom_dataset_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cafes.json");
    std::fs::write(&path, CAFE_DATASET).unwrap();

    let dataset = Dataset::from_json_file(&path).unwrap();
    assert_eq!(dataset.collection_names(), vec!["cafes", "visits"]);

    let store = MemoryStore::new();
    let summary = Seeder::seed(&store, &dataset).unwrap();
    assert_eq!(summary.total_inserted(), 2);
    assert_eq!(summary.inserted_into("visits"), Some(0));
    assert_eq!(
        store.list_collections().unwrap(),
        vec!["cafes".to_string(), "visits".to_string()]
    );
    assert_eq!(store.list_indexes("cafes").unwrap().len(), 3);
}

#[test]
fn test_invalid_dataset_file_names_the_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, r#"{ "collections": [{ "documents": [] }] }"#).unwrap();
    let err = Dataset::from_json_file(&path).unwrap_err();
    assert!(err.to_string().contains("broken.json"));
}

#[test]
fn test_seeding_twice_gives_same_counts() {
    let store = seeded_store();
    let first = counts(&store);
    Seeder::seed(&store, course()).unwrap();
    assert_eq!(counts(&store), first);
    assert_eq!(store.list_indexes("products").unwrap().len(), 4);
}

#[test]
fn test_reseed_restores_modified_data() {
    let store = seeded_store();
    store.delete_many("orders", &Default::default()).unwrap();
    assert_eq!(store.count_documents("orders", &Default::default()).unwrap(), 0);

    Seeder::seed(&store, course()).unwrap();
    assert_eq!(store.count_documents("orders", &Default::default()).unwrap(), 8);
}

#[test]
fn test_reset_drops_only_dataset_collections() {
    let store = seeded_store();
    store
        .insert_one("notes", labcheck::into_document(serde_json::json!({"text": "keep"})).unwrap())
        .unwrap();

    let dropped = Seeder::reset(&store, course()).unwrap();
    assert_eq!(dropped, 6);
    assert_eq!(store.list_collections().unwrap(), vec!["notes".to_string()]);
}
