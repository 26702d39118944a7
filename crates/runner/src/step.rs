//! Lab steps: a course command paired with the operation that performs it.

use std::fmt;

use labcheck_core::{Output, Result};
use labcheck_store::DocumentStore;

/// A statically defined step body.
///
/// Steps are plain function pointers so the registry never evaluates text:
/// the command text is only shown in reports and checked by the structural
/// guard.
pub type Operation = fn(&dyn DocumentStore) -> Result<Output>;

/// Minimum normalized result count a step must reach to pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Expectation {
    /// Smallest passing result count; `0` means "must not fail"
    pub minimum_results: u64,
}

impl Expectation {
    /// Pass whenever the operation returns normally.
    pub const fn must_not_fail() -> Self {
        Expectation { minimum_results: 0 }
    }

    /// Pass when at least `n` results come back.
    pub const fn at_least(n: u64) -> Self {
        Expectation { minimum_results: n }
    }
}

/// One validated course command.
#[derive(Clone)]
pub struct TestStep {
    /// Lab the step belongs to, e.g. `Lab 2 Queries`
    pub lab: &'static str,
    /// Stable identifier, unique across all labs
    pub id: &'static str,
    /// What the step checks
    pub description: &'static str,
    /// Shell command the course asks students to run
    pub command: &'static str,
    /// The statically defined operation
    pub operation: Operation,
    /// Passing threshold
    pub expectation: Expectation,
}

impl TestStep {
    /// Create a step that must not fail.
    pub fn new(
        lab: &'static str,
        id: &'static str,
        description: &'static str,
        command: &'static str,
        operation: Operation,
    ) -> Self {
        TestStep {
            lab,
            id,
            description,
            command,
            operation,
            expectation: Expectation::must_not_fail(),
        }
    }

    /// Require at least `n` results.
    pub fn expect_at_least(mut self, n: u64) -> Self {
        self.expectation = Expectation::at_least(n);
        self
    }
}

impl fmt::Debug for TestStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestStep")
            .field("lab", &self.lab)
            .field("id", &self.id)
            .field("command", &self.command)
            .field("expectation", &self.expectation)
            .finish()
    }
}
