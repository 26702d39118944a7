//! Step outcomes and failure kinds

use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// Returned normally with fewer results than expected
    Functional,
    /// The store rejected the command as malformed
    Syntax,
    /// Any other error, including panics
    Runtime,
    /// Multi-line command text with control flow, not run
    Structural,
}

impl FailureKind {
    /// Every kind, in report order.
    pub const ALL: [FailureKind; 4] = [
        FailureKind::Functional,
        FailureKind::Syntax,
        FailureKind::Runtime,
        FailureKind::Structural,
    ];
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Functional => "Functional",
            FailureKind::Syntax => "Syntax",
            FailureKind::Runtime => "Runtime",
            FailureKind::Structural => "Structural",
        };
        f.write_str(name)
    }
}

/// Classified result of running one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Result count met the expectation
    Pass {
        /// Normalized result count
        count: u64,
    },
    /// Returned normally but under the minimum
    FunctionalFail {
        /// Normalized result count
        count: u64,
        /// Expected minimum
        minimum: u64,
    },
    /// Error message matched a syntax pattern
    SyntaxFail {
        /// Error message
        message: String,
    },
    /// Any other error or a panic
    RuntimeFail {
        /// Error or panic message
        message: String,
    },
    /// Rejected by the structural guard; the operation was not invoked
    StructuralFail {
        /// Why the command text was rejected
        reason: String,
    },
}

impl StepOutcome {
    /// Whether the step passed.
    pub fn is_pass(&self) -> bool {
        matches!(self, StepOutcome::Pass { .. })
    }

    /// Failure kind, or `None` for a pass.
    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            StepOutcome::Pass { .. } => None,
            StepOutcome::FunctionalFail { .. } => Some(FailureKind::Functional),
            StepOutcome::SyntaxFail { .. } => Some(FailureKind::Syntax),
            StepOutcome::RuntimeFail { .. } => Some(FailureKind::Runtime),
            StepOutcome::StructuralFail { .. } => Some(FailureKind::Structural),
        }
    }

    /// Human-readable description for the failure list.
    pub fn message(&self) -> String {
        match self {
            StepOutcome::Pass { count } => format!("{} result(s)", count),
            StepOutcome::FunctionalFail { count, minimum } => {
                format!("expected at least {} result(s), got {}", minimum, count)
            }
            StepOutcome::SyntaxFail { message } | StepOutcome::RuntimeFail { message } => {
                message.clone()
            }
            StepOutcome::StructuralFail { reason } => reason.clone(),
        }
    }
}
