//! The course against a live MongoDB replica set.
//!
//! Ignored by default. Run with a server available:
//!
//! ```text
//! LABCHECK_MONGODB_URI="mongodb://localhost:27017/?replicaSet=rs0" \
//!     cargo test --test integration mongo_server -- --ignored
//! ```

use labcheck::{course, course_registry, DocumentStore, MongoStore, Runner, Seeder};

use crate::common::counts;

const DEFAULT_TEST_URI: &str = "mongodb://localhost:27017/?replicaSet=rs0";
/// Each test gets its own database so they can run in parallel.
fn connect(database: &str) -> MongoStore {
    let uri = std::env::var("LABCHECK_MONGODB_URI").unwrap_or_else(|_| DEFAULT_TEST_URI.to_string());
    MongoStore::connect(&uri, database).expect("MongoDB reachable")
}

#[test]
#[ignore = "needs a MongoDB replica set (LABCHECK_MONGODB_URI)"]
fn test_course_is_ready_against_server() {
    let store = connect("labcheck_test_course");
    Seeder::seed(&store, course()).unwrap();
    let before = counts(&store);

    let registry = course_registry().unwrap();
    let report = Runner::new(80).run(&store, registry.steps());
    assert!(report.is_ready(), "{:#?}", report.failures);
    assert_eq!(counts(&store), before);

    Seeder::reset(&store, course()).unwrap();
    assert!(store.list_collections().unwrap().is_empty());
}

#[test]
#[ignore = "needs a MongoDB replica set (LABCHECK_MONGODB_URI)"]
fn test_seeding_twice_gives_same_counts_on_server() {
    let store = connect("labcheck_test_seed");
    Seeder::seed(&store, course()).unwrap();
    let first = counts(&store);
    Seeder::seed(&store, course()).unwrap();
    assert_eq!(counts(&store), first);
    assert_eq!(store.list_indexes("products").unwrap().len(), 4);
    Seeder::reset(&store, course()).unwrap();
}
