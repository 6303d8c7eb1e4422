use std::collections::{BTreeMap, BTreeSet};

use crate::error::WorkflowError;

/// Ordered execution levels. Every dependency of a task sits in a strictly
/// earlier level; order within a level carries no meaning.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecutionPlan {
    levels: Vec<BTreeSet<String>>,
}

impl ExecutionPlan {
    pub fn levels(&self) -> &[BTreeSet<String>] {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn task_count(&self) -> usize {
        self.levels.iter().map(BTreeSet::len).sum()
    }

    pub fn level_of(&self, task: &str) -> Option<usize> {
        self.levels.iter().position(|level| level.contains(task))
    }

    pub fn to_vecs(&self) -> Vec<Vec<String>> {
        self.levels
            .iter()
            .map(|level| level.iter().cloned().collect())
            .collect()
    }
}

/// Peel off, level by level, the tasks whose dependencies are all already
/// scheduled.
///
/// The graph builder rejects cycles up front; if one still reaches this point
/// no task qualifies while some remain, and that is reported as a
/// `Validation` error naming the stuck tasks.
pub fn compute_levels(
    dependencies: &BTreeMap<String, BTreeSet<String>>,
) -> Result<ExecutionPlan, WorkflowError> {
    let mut remaining: BTreeSet<&str> = dependencies.keys().map(String::as_str).collect();
    let mut levels = Vec::new();

    while !remaining.is_empty() {
        let ready: BTreeSet<String> = remaining
            .iter()
            .filter(|name| {
                dependencies.get(**name).map_or(true, |deps| {
                    deps.iter().all(|dep| !remaining.contains(dep.as_str()))
                })
            })
            .map(|name| name.to_string())
            .collect();

        if ready.is_empty() {
            let stuck: Vec<&str> = remaining.into_iter().collect();
            return Err(WorkflowError::Validation(format!(
                "no schedulable task among remaining: {} (circular dependency)",
                stuck.join(", ")
            )));
        }

        for name in &ready {
            remaining.remove(name.as_str());
        }
        levels.push(ready);
    }

    Ok(ExecutionPlan { levels })
}
