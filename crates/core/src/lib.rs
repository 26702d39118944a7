//! Core types for labcheck
//!
//! This crate defines the types shared by the store, the seeder and the lab
//! runner:
//! - Document: JSON object plus dotted-path helpers
//! - Output: tagged result of a store operation
//! - WriteAck / Cursor: write acknowledgements and lazy query results
//! - FindOptions / UpdateOptions / IndexSpec: operation parameters
//! - Error: error type hierarchy
//! - LabcheckConfig: `labcheck.toml` configuration

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod document;
pub mod error;
pub mod options;
pub mod output;

pub use config::{
    LabcheckConfig, StoreBackend, CONFIG_FILE_NAME, DEFAULT_DATABASE, DEFAULT_DATA_FILE, DEFAULT_URI,
};
pub use document::{
    generate_id, get_path, into_document, lookup_path, remove_path, set_path, type_name,
    Document, Map, Value, ID_FIELD,
};
pub use error::{Error, Result};
pub use options::{FindOptions, IndexKind, IndexSpec, UpdateOptions};
pub use output::{Cursor, Output, WriteAck};
