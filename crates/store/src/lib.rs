//! Document store boundary for labcheck
//!
//! This crate defines [`DocumentStore`], the only interface the seeder and
//! the lab steps use to reach a database, and two implementations:
//!
//! - [`MongoStore`] drives a MongoDB deployment through the blocking driver
//!   API. This is what the labs are validated against.
//! - [`MemoryStore`] is an embedded store used by the test suites and by
//!   the `memory` backend. It covers the operations the course labs exercise:
//!
//! - filters with comparison, logical, array, regex, `$text` and geo operators
//! - update operators with upsert
//! - aggregation pipelines with `$group`, `$lookup`, `$unwind` and `$geoNear`
//! - ascending, unique, `2dsphere` and text indexes
//! - administrative commands (`ping`, `serverStatus`, `replSetGetStatus`, ...)
//! - single-level transactions with rollback
//!
//! # Example
//!
//! ```
//! use labcheck_core::{into_document, Document};
//! use labcheck_store::{DocumentStore, MemoryStore};
//! use serde_json::json;
//!
//! let store = MemoryStore::new();
//! store.insert_one("stores", into_document(json!({"name": "Downtown"})).unwrap()).unwrap();
//! assert_eq!(store.count_documents("stores", &Document::new()).unwrap(), 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod admin;
mod aggregate;
mod compare;
mod expr;
mod filter;
mod geo;
mod memory;
mod mongo;
mod snapshot;
mod text;
mod traits;
mod update;

pub use admin::{REPLICA_SET_NAME, SERVER_VERSION};
pub use memory::MemoryStore;
pub use mongo::MongoStore;
pub use traits::DocumentStore;
