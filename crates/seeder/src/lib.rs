//! Dataset seeding for labcheck
//!
//! [`Seeder`] replaces collections with the exact contents of a
//! [`Dataset`]. The built-in course data is available from [`course`],
//! and custom datasets load from JSON with [`Dataset::from_json_file`].

#![warn(missing_docs)]
#![warn(clippy::all)]

mod course;
mod dataset;
mod seeder;

pub use course::{course, insurance, retail};
pub use dataset::{CollectionSeed, Dataset};
pub use seeder::{CollectionSummary, SeedSummary, Seeder};
