//! labcheck - seed and validate document-database course labs
//!
//! labcheck loads the course dataset into a document store and replays
//! every lab command against it, reporting which commands a student's
//! environment would reject and why.
//!
//! # Quick Start
//!
//! ```
//! use labcheck::{course, course_registry, MemoryStore, Runner, Seeder};
//!
//! let store = MemoryStore::new();
//! Seeder::seed(&store, course()).unwrap();
//!
//! let registry = course_registry().unwrap();
//! let mut runner = Runner::new(80);
//! let report = runner.run(&store, registry.steps());
//! assert!(report.is_ready());
//! println!("{}", runner.report(&report));
//! ```
//!
//! # Architecture
//!
//! - `labcheck-core`: documents, operation outputs, errors, configuration
//! - `labcheck-store`: the [`DocumentStore`] boundary, [`MongoStore`] for a
//!   live server and the embedded [`MemoryStore`]
//! - `labcheck-seeder`: datasets and the [`Seeder`]
//! - `labcheck-runner`: lab steps, classification and the report

pub use labcheck_core::{
    into_document, Cursor, Document, Error, FindOptions, IndexKind, IndexSpec, LabcheckConfig,
    Output, Result, StoreBackend, UpdateOptions, Value, WriteAck,
};
pub use labcheck_runner::{
    course_registry, render_report, run_step, Expectation, FailureKind, Runner, StepOutcome,
    StepRegistry, TestReport, TestStep, LAB_NAMES,
};
pub use labcheck_seeder::{course, insurance, retail, CollectionSeed, Dataset, SeedSummary, Seeder};
pub use labcheck_store::{DocumentStore, MemoryStore, MongoStore};
