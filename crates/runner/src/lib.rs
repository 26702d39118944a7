//! Lab validation runner for labcheck
//!
//! A [`TestStep`] pairs the command text a student would type with an
//! [`Operation`] that performs it against a [`DocumentStore`]. The
//! [`Runner`] executes steps in order, classifies each result into a
//! [`StepOutcome`] and folds it into a [`TestReport`], which
//! [`render_report`] turns into the console report.
//!
//! The course labs live in [`labs`]; [`course_registry`] collects all of
//! them.
//!
//! [`DocumentStore`]: labcheck_store::DocumentStore

#![warn(missing_docs)]
#![warn(clippy::all)]

mod classify;
mod error;
pub mod labs;
mod normalize;
mod outcome;
mod registry;
mod report;
mod runner;
mod step;

pub use classify::{
    classify, classify_message, is_syntax_error, structural_violation, STRUCTURAL_TOKENS,
    SYNTAX_PATTERNS,
};
pub use error::{Error, Result};
pub use labs::{course_registry, course_steps, LAB_NAMES};
pub use normalize::result_count;
pub use outcome::{FailureKind, StepOutcome};
pub use registry::StepRegistry;
pub use report::{render_report, FailureRecord, LabTally, TestReport, DEFAULT_TRUNCATE_AT};
pub use runner::{run_step, Runner, RunnerState};
pub use step::{Expectation, Operation, TestStep};
