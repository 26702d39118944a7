//! Built-in course labs
//!
//! Each lab module lists its steps in course order. Steps run against the
//! course dataset (see `labcheck_seeder::course`) and some of them write to
//! it, so later steps assume earlier ones ran: lab 1 cleans up after itself,
//! lab 6 restores the stock it moves.

use labcheck_core::{into_document, Document, Result, Value};

use crate::error;
use crate::registry::StepRegistry;
use crate::step::TestStep;

mod admin;
mod aggregation;
mod crud;
mod geo_text;
mod indexes;
mod insurance;
mod queries;
mod transactions;

/// Lab 1: inserts, reads, updates and deletes
pub const LAB_CRUD: &str = "Lab 1 CRUD";
/// Lab 2: query operators, projection and sorting
pub const LAB_QUERIES: &str = "Lab 2 Queries";
/// Lab 3: aggregation pipelines
pub const LAB_AGGREGATION: &str = "Lab 3 Aggregation";
/// Lab 4: index management
pub const LAB_INDEXES: &str = "Lab 4 Indexes";
/// Lab 5: geospatial and full-text queries
pub const LAB_GEO_TEXT: &str = "Lab 5 Geospatial & Text";
/// Lab 6: multi-document transactions
pub const LAB_TRANSACTIONS: &str = "Lab 6 Transactions";
/// Lab 7: administrative commands
pub const LAB_ADMIN: &str = "Lab 7 Administration";
/// Lab 8: insurance case study
pub const LAB_INSURANCE: &str = "Lab 8 Insurance";

/// Every lab, in run order.
pub const LAB_NAMES: [&str; 8] = [
    LAB_CRUD,
    LAB_QUERIES,
    LAB_AGGREGATION,
    LAB_INDEXES,
    LAB_GEO_TEXT,
    LAB_TRANSACTIONS,
    LAB_ADMIN,
    LAB_INSURANCE,
];

/// All course steps in run order.
pub fn course_steps() -> Vec<TestStep> {
    [
        crud::steps(),
        queries::steps(),
        aggregation::steps(),
        indexes::steps(),
        geo_text::steps(),
        transactions::steps(),
        admin::steps(),
        insurance::steps(),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Registry holding every course step.
pub fn course_registry() -> error::Result<StepRegistry> {
    let mut registry = StepRegistry::new();
    registry.register_all(course_steps())?;
    Ok(registry)
}

fn doc(value: Value) -> Result<Document> {
    into_document(value)
}

fn pipeline(value: Value) -> Result<Vec<Document>> {
    match value {
        Value::Array(stages) => stages.into_iter().map(into_document).collect(),
        other => Ok(vec![into_document(other)?]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labcheck_seeder::{course, Seeder};
    use labcheck_store::MemoryStore;

    use crate::classify::structural_violation;
    use crate::runner::Runner;

    #[test]
    fn test_registry_covers_every_lab() {
        let registry = course_registry().unwrap();
        assert_eq!(registry.labs(), LAB_NAMES.to_vec());
    }

    #[test]
    fn test_course_commands_are_single_statements() {
        for step in course_steps() {
            assert!(structural_violation(step.command).is_none(), "{}", step.id);
        }
    }

    #[test]
    fn test_course_passes_on_seeded_store() {
        let store = MemoryStore::new();
        Seeder::seed(&store, course()).unwrap();
        let registry = course_registry().unwrap();
        let report = Runner::new(80).run(&store, registry.steps());
        assert!(report.failures.is_empty(), "{:#?}", report.failures);
        assert!(report.is_ready());
    }

    #[test]
    fn test_course_fails_without_seed() {
        let store = MemoryStore::new();
        let registry = course_registry().unwrap();
        let report = Runner::new(80).run(&store, registry.steps());
        assert!(report.failed > 0);
        assert_eq!(report.passed + report.failed, report.total);
    }
}
