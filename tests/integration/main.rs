//! Integration Tests
//!
//! Cross-crate tests organized by concern:
//! - Validation: seeding then running the course labs end to end
//! - Persistence: snapshot flush and reopen across store instances
//! - Datasets: custom dataset files and reseeding
//! - Properties: report invariants over random lab selections
//! - MongoDB: the course against a live server (ignored by default)

#[path = "../common/mod.rs"]
mod common;

mod datasets;
mod mongo_server;
mod persistence;
mod properties;
mod validation;
