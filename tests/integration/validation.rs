//! Seeding then running the course labs end to end.

use labcheck::{
    course_registry, run_step, FailureKind, MemoryStore, Output, Runner, StepOutcome, TestReport,
    TestStep, LAB_NAMES,
};

use crate::common::{counts, seeded_store};

#[test]
fn test_seeded_course_is_ready() {
    let store = seeded_store();
    let registry = course_registry().unwrap();
    let mut runner = Runner::new(80);
    let report = runner.run(&store, registry.steps());

    assert_eq!(report.total, registry.len() as u64);
    assert!(report.failures.is_empty(), "{:#?}", report.failures);
    assert_eq!(report.pass_rate_display(), "100.0");
    assert_eq!(report.labs.len(), LAB_NAMES.len());

    let text = runner.report(&report);
    assert!(text.contains("LAB VALIDATION REPORT"));
    assert!(text.contains("READY: all lab commands passed"));
    assert!(!text.contains("Failed commands:"));
}

#[test]
fn test_labs_leave_seeded_data_as_found() {
    let store = seeded_store();
    let before = counts(&store);
    let registry = course_registry().unwrap();

    let first = Runner::new(80).run(&store, registry.steps());
    let second = Runner::new(80).run(&store, registry.steps());

    assert!(first.is_ready());
    assert!(second.is_ready(), "{:#?}", second.failures);
    assert_eq!(counts(&store), before);
}

#[test]
fn test_unseeded_store_reports_failures() {
    let store = MemoryStore::new();
    let registry = course_registry().unwrap();
    let report = Runner::new(80).run(&store, registry.steps());

    assert!(!report.is_ready());
    assert_eq!(report.passed + report.failed, report.total);
    // Empty collections come back short; missing indexes fail outright
    assert!(report.failures_of(FailureKind::Functional) > 0);
    assert!(report.failures_of(FailureKind::Runtime) > 0);
    assert_eq!(report.failures_of(FailureKind::Structural), 0);
    assert!(labcheck::render_report(&report).contains("NOT READY"));
}

#[test]
fn test_lab_selection_runs_only_that_lab() {
    let store = seeded_store();
    let registry = course_registry().unwrap();
    let steps = registry.select(&["Lab 7 Administration".to_string()]).unwrap();
    let report = Runner::new(80).run(&store, steps);

    assert_eq!(report.labs.len(), 1);
    assert_eq!(report.labs[0].lab, "Lab 7 Administration");
    assert_eq!(report.total, report.labs[0].total);
    assert!(report.is_ready());
}

#[test]
fn test_mixed_outcomes_fold_into_one_report() {
    let store = seeded_store();
    let steps = vec![
        TestStep::new("Lab 2 Queries", "ok", "", "db.stores.countDocuments({})", |store| {
            Ok(Output::Count(store.count_documents("stores", &Default::default())?))
        })
        .expect_at_least(5),
        TestStep::new("Lab 2 Queries", "short", "", "db.stores.find({})", |store| {
            Ok(Output::Cursor(store.find("stores", &Default::default(), Default::default())?))
        })
        .expect_at_least(50),
        TestStep::new("Lab 2 Queries", "typo", "", "db.stores.find({ $gtt: 1 })", |store| {
            let filter = labcheck::into_document(serde_json::json!({"rating": {"$gtt": 1}}))?;
            Ok(Output::Cursor(store.find("stores", &filter, Default::default())?))
        }),
        TestStep::new(
            "Lab 2 Queries",
            "script",
            "",
            "db.stores.find().forEach(s => {\n  printjson(s)\n})",
            |_| Ok(Output::Unit),
        ),
    ];

    let mut report = TestReport::new();
    let mut outcomes = Vec::new();
    for step in &steps {
        let (next, outcome) = run_step(report, step, &store);
        report = next;
        outcomes.push(outcome);
    }

    assert_eq!(outcomes[0], StepOutcome::Pass { count: 5 });
    assert_eq!(outcomes[1], StepOutcome::FunctionalFail { count: 5, minimum: 50 });
    assert_eq!(outcomes[2].kind(), Some(FailureKind::Syntax));
    assert_eq!(outcomes[3].kind(), Some(FailureKind::Structural));
    assert_eq!((report.total, report.passed, report.failed), (4, 1, 3));
    assert_eq!(
        report.failures.iter().map(|f| f.step_id.as_str()).collect::<Vec<_>>(),
        vec!["short", "typo", "script"]
    );
}
