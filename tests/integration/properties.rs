//! Report invariants over random lab selections.

use labcheck::{course_registry, MemoryStore, Runner, LAB_NAMES};
use proptest::prelude::*;

use crate::common::seeded_store;

fn lab_selection() -> impl Strategy<Value = Vec<String>> {
    proptest::sample::subsequence(LAB_NAMES.to_vec(), 0..=LAB_NAMES.len())
        .prop_map(|labs| labs.into_iter().map(String::from).collect())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn test_any_lab_selection_passes_on_seeded_store(labs in lab_selection()) {
        let registry = course_registry().unwrap();
        let steps = registry.select(&labs).unwrap();
        let expected = steps.len() as u64;

        let store = seeded_store();
        let report = Runner::new(80).run(&store, steps);

        prop_assert_eq!(report.total, expected);
        prop_assert_eq!(report.passed + report.failed, report.total);
        prop_assert!(report.failures.is_empty(), "{:#?}", report.failures);
        let lab_total: u64 = report.labs.iter().map(|tally| tally.total).sum();
        prop_assert_eq!(lab_total, report.total);
    }

    #[test]
    fn test_counters_balance_on_empty_store(labs in lab_selection()) {
        let registry = course_registry().unwrap();
        let steps = registry.select(&labs).unwrap();

        let store = MemoryStore::new();
        let report = Runner::new(40).run(&store, steps);

        prop_assert_eq!(report.passed + report.failed, report.total);
        prop_assert_eq!(report.failures.len() as u64, report.failed);
        prop_assert!(report.failures.iter().all(|f| f.command.chars().count() <= 40));
    }
}
