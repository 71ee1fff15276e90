//! Workflow definitions and their static validation.

use crate::context::Context;
use crate::error::WorkflowError;
use crate::ids::IdGenerator;
use crate::step::Step;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A context key filled with a fresh identifier at the start of every run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedSpec {
    pub key: String,
    pub prefix: String,
}

impl SeedSpec {
    pub fn new(key: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            prefix: prefix.into(),
        }
    }
}

/// Unvalidated workflow as written in a scenario file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSpec {
    pub name: String,
    #[serde(default)]
    pub seeds: Vec<SeedSpec>,
    pub steps: Vec<Step>,
}

/// An ordered, validated sequence of steps.
///
/// Construction guarantees that every key a step reads is either seeded or
/// extracted by an earlier step, and that no key is defined twice. A key can
/// still be missing at runtime when the step that extracts it fails.
#[derive(Debug, Clone)]
pub struct Workflow {
    name: String,
    seeds: Vec<SeedSpec>,
    steps: Vec<Step>,
}

impl Workflow {
    pub fn new(
        name: impl Into<String>,
        seeds: Vec<SeedSpec>,
        steps: Vec<Step>,
    ) -> Result<Self, WorkflowError> {
        if steps.is_empty() {
            return Err(WorkflowError::Empty);
        }

        let mut defined: HashSet<&str> = HashSet::new();
        for seed in &seeds {
            if !defined.insert(seed.key.as_str()) {
                return Err(WorkflowError::DuplicateSeed(seed.key.clone()));
            }
        }

        let mut names: HashSet<&str> = HashSet::new();
        for step in &steps {
            if !names.insert(step.name.as_str()) {
                return Err(WorkflowError::DuplicateStepName(step.name.clone()));
            }

            let required = step
                .required_keys()
                .map_err(|message| WorkflowError::MalformedTemplate {
                    step: step.name.clone(),
                    message,
                })?;
            if let Some(key) = required.iter().find(|k| !defined.contains(k.as_str())) {
                return Err(WorkflowError::UnresolvedKey {
                    step: step.name.clone(),
                    key: key.clone(),
                });
            }

            for key in step.provided_keys() {
                if !defined.insert(key) {
                    return Err(WorkflowError::KeyRedefined {
                        step: step.name.clone(),
                        key: key.to_string(),
                    });
                }
            }
        }

        Ok(Self {
            name: name.into(),
            seeds,
            steps,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn seeds(&self) -> &[SeedSpec] {
        &self.seeds
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Fresh context for one run, with one new identifier per seed.
    pub fn seed_context(&self, ids: &mut IdGenerator) -> Context {
        let mut ctx = Context::new();
        for seed in &self.seeds {
            // Seed keys are unique, checked in `new`
            let _ = ctx.set_id(seed.key.clone(), ids.generate(&seed.prefix));
        }
        ctx
    }
}

impl TryFrom<WorkflowSpec> for Workflow {
    type Error = WorkflowError;

    fn try_from(spec: WorkflowSpec) -> Result<Self, Self::Error> {
        Workflow::new(spec.name, spec.seeds, spec.steps)
    }
}
