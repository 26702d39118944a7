//! Error types for step registration and lab selection.
//!
//! Step *failures* are never errors: they become [`StepOutcome`](crate::StepOutcome)s
//! in the report. These errors cover misconfiguration of the run itself.

use serde::{Deserialize, Serialize};

/// Result type alias for runner operations
pub type Result<T> = std::result::Result<T, Error>;

/// Registry and selection errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum Error {
    /// Two steps were registered under the same identifier
    #[error("duplicate step id: {id}")]
    DuplicateStep {
        /// The repeated identifier
        id: String,
    },

    /// No step is registered under the identifier
    #[error("unknown step id: {id}")]
    UnknownStep {
        /// The requested identifier
        id: String,
    },

    /// A lab filter names a lab with no registered steps
    #[error("unknown lab: '{lab}' (known labs: {known})")]
    UnknownLab {
        /// The requested lab
        lab: String,
        /// Comma-separated registered lab names
        known: String,
    },
}
