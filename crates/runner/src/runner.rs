//! Step execution and the run state machine.

use std::panic::{catch_unwind, AssertUnwindSafe};

use labcheck_store::DocumentStore;
use tracing::{debug, info, warn};

use crate::classify::{classify, structural_violation};
use crate::outcome::StepOutcome;
use crate::report::{render_report, TestReport};
use crate::step::TestStep;

/// Run one step and fold its outcome into the report.
///
/// The structural guard runs first; a rejected step never invokes its
/// operation. Errors and panics from the operation become failures, so
/// nothing escapes this call.
pub fn run_step(report: TestReport, step: &TestStep, store: &dyn DocumentStore) -> (TestReport, StepOutcome) {
    let outcome = match structural_violation(step.command) {
        Some(reason) => StepOutcome::StructuralFail { reason },
        None => match catch_unwind(AssertUnwindSafe(|| (step.operation)(store))) {
            Ok(result) => classify(result, step.expectation),
            Err(payload) => StepOutcome::RuntimeFail {
                message: format!("operation panicked: {}", panic_message(payload.as_ref())),
            },
        },
    };

    match &outcome {
        StepOutcome::Pass { count } => {
            debug!(target: "labcheck::runner", step = step.id, count, "Step passed")
        }
        failed => warn!(
            target: "labcheck::runner",
            step = step.id,
            lab = step.lab,
            kind = ?failed.kind(),
            message = %failed.message(),
            "Step failed"
        ),
    }

    (report.record(step, &outcome), outcome)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Where a [`Runner`] is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    /// No run in progress
    Idle,
    /// Executing steps
    Running,
    /// Steps done, report not yet rendered
    Reporting,
}

/// Runs steps strictly in order and renders the report.
///
/// `Idle -> Running -> Reporting -> Idle`: [`run`](Self::run) executes every
/// step and leaves the runner in `Reporting`; [`report`](Self::report)
/// renders the console text and returns it to `Idle`.
#[derive(Debug)]
pub struct Runner {
    state: RunnerState,
    truncate_at: usize,
}

impl Runner {
    /// Create an idle runner.
    pub fn new(truncate_at: usize) -> Self {
        Runner {
            state: RunnerState::Idle,
            truncate_at,
        }
    }

    /// Current state.
    pub fn state(&self) -> RunnerState {
        self.state
    }

    /// Execute the steps in order against the store.
    pub fn run<'a>(
        &mut self,
        store: &dyn DocumentStore,
        steps: impl IntoIterator<Item = &'a TestStep>,
    ) -> TestReport {
        self.state = RunnerState::Running;
        let report = steps
            .into_iter()
            .fold(TestReport::with_truncation(self.truncate_at), |report, step| {
                run_step(report, step, store).0
            });
        info!(
            target: "labcheck::runner",
            total = report.total,
            passed = report.passed,
            failed = report.failed,
            "Validation run complete"
        );
        self.state = RunnerState::Reporting;
        report
    }

    /// Render the report of the last run and return to `Idle`.
    pub fn report(&mut self, report: &TestReport) -> String {
        let text = render_report(report);
        self.state = RunnerState::Idle;
        text
    }
}
