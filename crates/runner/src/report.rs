//! Accumulated run results and the console report.
//!
//! A [`TestReport`] is a value: [`TestReport::record`] consumes it and returns
//! the updated report, so the runner folds steps into it without shared
//! mutable state. `passed + failed == total` holds after every record.

use std::collections::BTreeMap;
use std::fmt::Write;

use serde::Serialize;

use crate::outcome::{FailureKind, StepOutcome};
use crate::step::TestStep;

/// Default command text length kept in failure records.
pub const DEFAULT_TRUNCATE_AT: usize = 80;

const RULE_WIDTH: usize = 64;

const ELLIPSIS: &str = "...";

/// One failed step, in execution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    /// Lab name
    pub lab: String,
    /// Step identifier
    pub step_id: String,
    /// Command text, whitespace-collapsed and truncated
    pub command: String,
    /// Failure description
    pub message: String,
    /// Failure kind
    pub kind: FailureKind,
}

/// Per-lab pass tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabTally {
    /// Lab name
    pub lab: String,
    /// Steps run
    pub total: u64,
    /// Steps passed
    pub passed: u64,
}

/// Counters and failure records for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestReport {
    /// Steps run
    pub total: u64,
    /// Steps passed
    pub passed: u64,
    /// Steps failed
    pub failed: u64,
    /// Failure counts per kind
    pub failures_by_kind: BTreeMap<FailureKind, u64>,
    /// Lab tallies in first-seen order
    pub labs: Vec<LabTally>,
    /// Failures in execution order
    pub failures: Vec<FailureRecord>,
    #[serde(skip)]
    truncate_at: usize,
}

impl Default for TestReport {
    fn default() -> Self {
        Self::with_truncation(DEFAULT_TRUNCATE_AT)
    }
}

impl TestReport {
    /// Empty report with the default truncation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty report keeping at most `truncate_at` characters of command text.
    pub fn with_truncation(truncate_at: usize) -> Self {
        TestReport {
            total: 0,
            passed: 0,
            failed: 0,
            failures_by_kind: BTreeMap::new(),
            labs: Vec::new(),
            failures: Vec::new(),
            truncate_at,
        }
    }

    /// Fold one step outcome into the report.
    pub fn record(mut self, step: &TestStep, outcome: &StepOutcome) -> Self {
        self.total += 1;
        let passed = outcome.is_pass();
        if passed {
            self.passed += 1;
        } else {
            self.failed += 1;
        }

        match self.labs.iter_mut().find(|t| t.lab == step.lab) {
            Some(tally) => {
                tally.total += 1;
                tally.passed += u64::from(passed);
            }
            None => self.labs.push(LabTally {
                lab: step.lab.to_string(),
                total: 1,
                passed: u64::from(passed),
            }),
        }

        if let Some(kind) = outcome.kind() {
            *self.failures_by_kind.entry(kind).or_insert(0) += 1;
            self.failures.push(FailureRecord {
                lab: step.lab.to_string(),
                step_id: step.id.to_string(),
                command: truncate(step.command, self.truncate_at),
                message: outcome.message(),
                kind,
            });
        }
        self
    }

    /// Failures of one kind.
    pub fn failures_of(&self, kind: FailureKind) -> u64 {
        self.failures_by_kind.get(&kind).copied().unwrap_or(0)
    }

    /// `passed / total * 100`, or 0 for an empty run.
    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.passed as f64 / self.total as f64 * 100.0
        }
    }

    /// Pass rate with one decimal, e.g. `"90.0"`. Halves round up, so
    /// 1 of 16 is `"6.3"`.
    pub fn pass_rate_display(&self) -> String {
        if self.total == 0 {
            return "0.0".to_string();
        }
        // Integer tenths of a percent, rounded half up
        let tenths = (self.passed * 2000 + self.total) / (2 * self.total);
        format!("{}.{}", tenths / 10, tenths % 10)
    }

    /// Whether every command passed.
    pub fn is_ready(&self) -> bool {
        self.failed == 0 && self.total > 0 && self.passed == self.total
    }
}

/// Collapse whitespace runs and cut to `max` characters, ending in an
/// ellipsis when there is room for one.
fn truncate(command: &str, max: usize) -> String {
    let collapsed = command.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max {
        return collapsed;
    }
    if max <= ELLIPSIS.len() {
        return collapsed.chars().take(max).collect();
    }
    let mut out: String = collapsed.chars().take(max - ELLIPSIS.len()).collect();
    out.push_str(ELLIPSIS);
    out
}

/// Render the console report for a completed run.
pub fn render_report(report: &TestReport) -> String {
    let heavy = "=".repeat(RULE_WIDTH);
    let light = "-".repeat(RULE_WIDTH);
    let mut out = String::new();

    // Writing to a String cannot fail
    let _ = writeln!(out, "{}", heavy);
    let _ = writeln!(out, "  LAB VALIDATION REPORT");
    let _ = writeln!(out, "{}", heavy);
    let _ = writeln!(out);

    for tally in &report.labs {
        let mark = if tally.passed == tally.total { "ok" } else { "FAIL" };
        let _ = writeln!(
            out,
            "  {:<32} {:>3}/{:<3} passed  [{}]",
            tally.lab, tally.passed, tally.total, mark
        );
    }
    if !report.labs.is_empty() {
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "{}", light);
    let _ = writeln!(out, "  SUMMARY");
    let _ = writeln!(out, "{}", light);
    let _ = writeln!(out, "Total Commands Tested: {}", report.total);
    let _ = writeln!(out, "Passed: {}", report.passed);
    let _ = writeln!(out, "Failed: {}", report.failed);
    let _ = writeln!(out, "Pass Rate: {}%", report.pass_rate_display());

    if report.failed > 0 {
        let _ = writeln!(out);
        let _ = writeln!(out, "Failures by kind:");
        for kind in FailureKind::ALL {
            let _ = writeln!(out, "  {:<11} {}", format!("{}:", kind), report.failures_of(kind));
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "Failed commands:");
        for (i, failure) in report.failures.iter().enumerate() {
            let _ = writeln!(
                out,
                "  {}. [{}] {} ({}): {}",
                i + 1,
                failure.lab,
                failure.step_id,
                failure.kind,
                failure.command
            );
            let _ = writeln!(out, "     -> {}", failure.message);
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "{}", heavy);
    if report.is_ready() {
        let _ = writeln!(out, "  READY: all lab commands passed");
    } else {
        let _ = writeln!(
            out,
            "  NOT READY: {} of {} command(s) failed",
            report.failed, report.total
        );
    }
    let _ = write!(out, "{}", heavy);
    out
}
