//! Snapshot flush and reopen across store instances.

use labcheck::{course, course_registry, DocumentStore, FindOptions, MemoryStore, Runner, Seeder};
use serde_json::json;

use crate::common::{counts, temp_data_file};

#[test]
fn test_missing_snapshot_opens_empty() {
    let (_dir, path) = temp_data_file();
    let store = MemoryStore::open(&path).unwrap();
    assert!(store.is_persistent());
    assert_eq!(store.path(), Some(path.as_path()));
    assert!(store.list_collections().unwrap().is_empty());
    assert!(!path.exists());
}

#[test]
fn test_seed_in_one_process_validate_in_another() {
    let (_dir, path) = temp_data_file();
    {
        let store = MemoryStore::open(&path).unwrap();
        Seeder::seed(&store, course()).unwrap();
        store.flush().unwrap();
    }
    assert!(path.exists());

    let reopened = MemoryStore::open(&path).unwrap();
    assert_eq!(counts(&reopened).iter().map(|(_, n)| n).sum::<u64>(), 37);

    // Indexes survive the round trip, so text and geo queries still work
    let filter = labcheck::into_document(json!({"$text": {"$search": "collision"}})).unwrap();
    assert_eq!(reopened.find("claims", &filter, FindOptions::default()).unwrap().count(), 2);

    let report = Runner::new(80).run(&reopened, course_registry().unwrap().steps());
    assert!(report.is_ready(), "{:#?}", report.failures);
}

#[test]
fn test_unflushed_changes_are_not_persisted() {
    let (_dir, path) = temp_data_file();
    let store = MemoryStore::open(&path).unwrap();
    Seeder::seed(&store, course()).unwrap();
    store.flush().unwrap();

    let registry = course_registry().unwrap();
    Runner::new(80).run(&store, registry.steps());
    // The index lab added a unique index on customers in memory only
    assert_eq!(store.list_indexes("customers").unwrap().len(), 3);

    let reopened = MemoryStore::open(&path).unwrap();
    assert_eq!(reopened.list_indexes("customers").unwrap().len(), 2);
    assert_eq!(counts(&reopened), counts(&store));
}

#[test]
fn test_corrupt_snapshot_is_an_error() {
    let (_dir, path) = temp_data_file();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "{ not json").unwrap();
    assert!(MemoryStore::open(&path).is_err());
}
