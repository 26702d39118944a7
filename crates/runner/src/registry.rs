//! Step registry keyed by stable step identifiers.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::step::TestStep;

/// Ordered collection of steps with lookup by id.
#[derive(Debug, Default, Clone)]
pub struct StepRegistry {
    steps: Vec<TestStep>,
    by_id: HashMap<&'static str, usize>,
}

impl StepRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a step; ids must be unique.
    pub fn register(&mut self, step: TestStep) -> Result<()> {
        if self.by_id.contains_key(step.id) {
            return Err(Error::DuplicateStep {
                id: step.id.to_string(),
            });
        }
        self.by_id.insert(step.id, self.steps.len());
        self.steps.push(step);
        Ok(())
    }

    /// Register every step, stopping at the first duplicate.
    pub fn register_all(&mut self, steps: impl IntoIterator<Item = TestStep>) -> Result<()> {
        steps.into_iter().try_for_each(|step| self.register(step))
    }

    /// Look up a step by id.
    pub fn get(&self, id: &str) -> Result<&TestStep> {
        self.by_id
            .get(id)
            .map(|&i| &self.steps[i])
            .ok_or_else(|| Error::UnknownStep { id: id.to_string() })
    }

    /// Steps in registration order.
    pub fn steps(&self) -> &[TestStep] {
        &self.steps
    }

    /// Lab names in first-registered order.
    pub fn labs(&self) -> Vec<&'static str> {
        let mut labs: Vec<&'static str> = Vec::new();
        for step in &self.steps {
            if !labs.contains(&step.lab) {
                labs.push(step.lab);
            }
        }
        labs
    }

    /// Steps of the named labs, in registration order. An empty filter
    /// selects every step.
    pub fn select(&self, labs: &[String]) -> Result<Vec<&TestStep>> {
        let known = self.labs();
        if let Some(unknown) = labs.iter().find(|l| !known.contains(&l.as_str())) {
            return Err(Error::UnknownLab {
                lab: unknown.clone(),
                known: known.join(", "),
            });
        }
        Ok(self
            .steps
            .iter()
            .filter(|s| labs.is_empty() || labs.iter().any(|l| l == s.lab))
            .collect())
    }

    /// Number of registered steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether no steps are registered.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labcheck_core::Output;

    fn step(lab: &'static str, id: &'static str) -> TestStep {
        TestStep::new(lab, id, "", "db.x.find()", |_| Ok(Output::Unit))
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let mut registry = StepRegistry::new();
        registry.register(step("Lab 1 CRUD", "a")).unwrap();
        assert_eq!(
            registry.register(step("Lab 2 Queries", "a")),
            Err(Error::DuplicateStep { id: "a".into() })
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_lookup_by_id() {
        let mut registry = StepRegistry::new();
        registry
            .register_all(vec![step("Lab 1 CRUD", "a"), step("Lab 1 CRUD", "b")])
            .unwrap();
        assert_eq!(registry.get("b").unwrap().id, "b");
        assert!(matches!(registry.get("zz"), Err(Error::UnknownStep { .. })));
    }

    #[test]
    fn test_select_by_lab_keeps_order() {
        let mut registry = StepRegistry::new();
        registry
            .register_all(vec![
                step("Lab 1 CRUD", "a"),
                step("Lab 2 Queries", "b"),
                step("Lab 1 CRUD", "c"),
            ])
            .unwrap();
        assert_eq!(registry.labs(), vec!["Lab 1 CRUD", "Lab 2 Queries"]);
        let ids: Vec<_> = registry
            .select(&["Lab 1 CRUD".to_string()])
            .unwrap()
            .iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(registry.select(&[]).unwrap().len(), 3);
        assert!(matches!(
            registry.select(&["Lab 9".to_string()]),
            Err(Error::UnknownLab { .. })
        ));
    }
}
