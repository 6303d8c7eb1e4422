use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;

use crate::error::WorkflowError;
use crate::guard::ResourceLimits;
use crate::params::ParamSchema;

use super::plan::{compute_levels, ExecutionPlan};
use super::types::{TaskFn, TaskSpec};

/// A registered task with its resolved edges.
pub struct TaskNode {
    pub(crate) name: String,
    pub(crate) dependencies: BTreeSet<String>,
    pub(crate) dependents: BTreeSet<String>,
    pub(crate) func: TaskFn,
    pub(crate) timeout: Option<Duration>,
    pub(crate) limits: ResourceLimits,
    pub(crate) params: Option<ParamSchema>,
}

impl TaskNode {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dependencies(&self) -> &BTreeSet<String> {
        &self.dependencies
    }

    /// Tasks that list this one as a dependency.
    pub fn dependents(&self) -> &BTreeSet<String> {
        &self.dependents
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn limits(&self) -> ResourceLimits {
        self.limits
    }

    pub fn param_schema(&self) -> Option<&ParamSchema> {
        self.params.as_ref()
    }
}

impl fmt::Debug for TaskNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskNode")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("dependents", &self.dependents)
            .field("timeout", &self.timeout)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

/// Collects task declarations. Dependencies may be declared before the
/// tasks they name; everything is checked in [`WorkflowBuilder::build`].
#[derive(Debug, Default)]
pub struct WorkflowBuilder {
    tasks: Vec<TaskSpec>,
}

impl WorkflowBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_task(&mut self, spec: TaskSpec) -> &mut Self {
        self.tasks.push(spec);
        self
    }

    /// Chaining form of [`add_task`](Self::add_task).
    pub fn task(mut self, spec: TaskSpec) -> Self {
        self.tasks.push(spec);
        self
    }

    /// Construct and validate the task graph.
    pub fn build(self) -> Result<TaskGraph, WorkflowError> {
        TaskGraph::from_specs(self.tasks)
    }
}

/// Validated task dependency graph (DAG).
#[derive(Debug)]
pub struct TaskGraph {
    nodes: BTreeMap<String, TaskNode>,
}

impl TaskGraph {
    /// Construct task graph from task declarations
    pub fn from_specs(specs: Vec<TaskSpec>) -> Result<Self, WorkflowError> {
        let mut nodes = BTreeMap::new();
        let mut duplicates = BTreeSet::new();

        for spec in specs {
            if nodes.contains_key(&spec.name) {
                duplicates.insert(spec.name);
                continue;
            }
            let node = TaskNode {
                name: spec.name.clone(),
                dependencies: spec.dependencies.into_iter().collect(),
                dependents: BTreeSet::new(),
                func: spec.func,
                timeout: spec.timeout,
                limits: spec.limits,
                params: spec.params,
            };
            nodes.insert(spec.name, node);
        }

        if !duplicates.is_empty() {
            return Err(WorkflowError::DuplicateTask(duplicates.into_iter().collect()));
        }

        let mut graph = Self { nodes };
        graph.validate()?;
        graph.link_dependents();
        Ok(graph)
    }

    /// Validate dependency relationships.
    ///
    /// Every missing reference across the whole graph is reported at once;
    /// cycles are only looked for once all references resolve.
    pub fn validate(&self) -> Result<(), WorkflowError> {
        let missing = self.missing_dependencies();
        if !missing.is_empty() {
            return Err(WorkflowError::MissingDependency(missing));
        }

        if let Some(cycle) = self.detect_cycle() {
            return Err(WorkflowError::CyclicDependency(cycle));
        }

        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&TaskNode> {
        self.nodes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &TaskNode> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Dependency sets by task name.
    pub fn dependency_map(&self) -> BTreeMap<String, BTreeSet<String>> {
        self.nodes
            .iter()
            .map(|(name, node)| (name.clone(), node.dependencies.clone()))
            .collect()
    }

    /// Group tasks into execution levels.
    pub fn execution_plan(&self) -> Result<ExecutionPlan, WorkflowError> {
        compute_levels(&self.dependency_map())
    }

    fn missing_dependencies(&self) -> BTreeMap<String, Vec<String>> {
        self.nodes
            .values()
            .filter_map(|node| {
                let missing: Vec<String> = node
                    .dependencies
                    .iter()
                    .filter(|dep| !self.nodes.contains_key(*dep))
                    .cloned()
                    .collect();
                (!missing.is_empty()).then(|| (node.name.clone(), missing))
            })
            .collect()
    }

    fn link_dependents(&mut self) {
        let edges: Vec<(String, String)> = self
            .nodes
            .values()
            .flat_map(|node| {
                node.dependencies
                    .iter()
                    .map(move |dep| (dep.clone(), node.name.clone()))
            })
            .collect();

        for node in self.nodes.values_mut() {
            node.dependents.clear();
        }
        for (dep, dependent) in edges {
            if let Some(node) = self.nodes.get_mut(&dep) {
                node.dependents.insert(dependent);
            }
        }
    }

    /// Detect circular dependencies with an explicit-stack DFS.
    ///
    /// Returns the first cycle found as a closed path, e.g. `[a, b, a]`
    /// where `a` depends on `b` and `b` on `a`. Nodes fully explored are
    /// never walked again, so this is O(V + E).
    fn detect_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            OnPath,
            Done,
        }

        let mut marks: BTreeMap<&str, Mark> = BTreeMap::new();

        for (start, start_node) in &self.nodes {
            if marks.contains_key(start.as_str()) {
                continue;
            }

            let mut path: Vec<&str> = vec![start.as_str()];
            let mut stack = vec![start_node.dependencies.iter()];
            marks.insert(start.as_str(), Mark::OnPath);

            while let Some(frontier) = stack.last_mut() {
                let Some(dep) = frontier.next() else {
                    stack.pop();
                    if let Some(done) = path.pop() {
                        marks.insert(done, Mark::Done);
                    }
                    continue;
                };

                match marks.get(dep.as_str()) {
                    Some(Mark::OnPath) => {
                        let pos = path.iter().position(|name| *name == dep.as_str())?;
                        let mut cycle: Vec<String> =
                            path[pos..].iter().map(|name| name.to_string()).collect();
                        cycle.push(dep.clone());
                        return Some(cycle);
                    }
                    Some(Mark::Done) => {}
                    None => {
                        if let Some(node) = self.nodes.get(dep) {
                            marks.insert(dep.as_str(), Mark::OnPath);
                            path.push(dep.as_str());
                            stack.push(node.dependencies.iter());
                        }
                    }
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    fn noop(name: &str) -> TaskSpec {
        TaskSpec::new(name, |_ctx| async { Ok(Value::Null) })
    }

    fn names(set: &BTreeSet<String>) -> Vec<&str> {
        set.iter().map(String::as_str).collect()
    }

    #[test]
    fn dependents_are_the_transpose() {
        let graph = WorkflowBuilder::new()
            .task(noop("load"))
            .task(noop("clean").depends_on(["load"]))
            .task(noop("train").depends_on(["clean"]))
            .task(noop("report").depends_on(["clean", "load"]))
            .build()
            .unwrap();

        assert_eq!(names(graph.get("load").unwrap().dependents()), vec!["clean", "report"]);
        assert_eq!(names(graph.get("clean").unwrap().dependents()), vec!["report", "train"]);
        assert!(graph.get("train").unwrap().dependents().is_empty());

        for node in graph.nodes() {
            for dep in node.dependencies() {
                assert!(graph.get(dep).unwrap().dependents().contains(node.name()));
            }
        }
    }

    #[test]
    fn forward_references_are_allowed() {
        let graph = WorkflowBuilder::new()
            .task(noop("b").depends_on(["a"]))
            .task(noop("a"))
            .build()
            .unwrap();
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn missing_dependencies_are_collected_across_tasks() {
        let err = WorkflowBuilder::new()
            .task(noop("a").depends_on(["ghost"]))
            .task(noop("b").depends_on(["a", "phantom", "spectre"]))
            .task(noop("c").depends_on(["a"]))
            .build()
            .unwrap_err();

        match err {
            WorkflowError::MissingDependency(missing) => {
                let mut expected = BTreeMap::new();
                expected.insert("a".to_string(), vec!["ghost".to_string()]);
                expected.insert(
                    "b".to_string(),
                    vec!["phantom".to_string(), "spectre".to_string()],
                );
                assert_eq!(missing, expected);
            }
            other => panic!("expected MissingDependency, got {other:?}"),
        }
    }

    #[test]
    fn two_node_cycle_is_reported_as_closed_path() {
        let err = WorkflowBuilder::new()
            .task(noop("a").depends_on(["b"]))
            .task(noop("b").depends_on(["a"]))
            .build()
            .unwrap_err();

        match err {
            WorkflowError::CyclicDependency(cycle) => assert_eq!(cycle, vec!["a", "b", "a"]),
            other => panic!("expected CyclicDependency, got {other:?}"),
        }
    }

    #[test]
    fn cycle_behind_an_acyclic_prefix_names_only_cycle_nodes() {
        let err = WorkflowBuilder::new()
            .task(noop("entry").depends_on(["x"]))
            .task(noop("x").depends_on(["y"]))
            .task(noop("y").depends_on(["z"]))
            .task(noop("z").depends_on(["x"]))
            .build()
            .unwrap_err();

        match err {
            WorkflowError::CyclicDependency(cycle) => {
                assert_eq!(cycle, vec!["x", "y", "z", "x"]);
            }
            other => panic!("expected CyclicDependency, got {other:?}"),
        }
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let err = WorkflowBuilder::new()
            .task(noop("solo").depends_on(["solo"]))
            .build()
            .unwrap_err();
        assert!(matches!(err, WorkflowError::CyclicDependency(c) if c == vec!["solo", "solo"]));
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        let graph = WorkflowBuilder::new()
            .task(noop("top"))
            .task(noop("left").depends_on(["top"]))
            .task(noop("right").depends_on(["top"]))
            .task(noop("bottom").depends_on(["left", "right"]))
            .build();
        assert!(graph.is_ok());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = WorkflowBuilder::new()
            .task(noop("a"))
            .task(noop("a"))
            .task(noop("b"))
            .task(noop("b"))
            .build()
            .unwrap_err();
        assert!(matches!(err, WorkflowError::DuplicateTask(d) if d == vec!["a", "b"]));
    }
}
