use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use thiserror::Error;

use super::checkpoint::CheckpointError;
use super::params::ParameterError;

/// Error categories surfaced to callers (the CLI maps them to exit codes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    ValidationError = 3,
    DependencyError = 11,
    CircularDependency = 12,
    ParameterError = 13,
    Timeout = 30,
    ResourceExhausted = 32,
    CheckpointError = 60,
    TaskFailed = 70,
}

impl ErrorCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

/// Resource sampled by the resource guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Memory,
    Cpu,
}

impl ResourceKind {
    pub fn unit(self) -> &'static str {
        match self {
            Self::Memory => "MB",
            Self::Cpu => "%",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => f.write_str("memory"),
            Self::Cpu => f.write_str("CPU"),
        }
    }
}

/// Errors raised while building or running a workflow.
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("duplicate task name(s): {}", .0.join(", "))]
    DuplicateTask(Vec<String>),

    #[error("missing dependencies:\n{}", format_missing(.0))]
    MissingDependency(BTreeMap<String, Vec<String>>),

    #[error("circular dependency detected: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),

    #[error("workflow validation failed: {0}")]
    Validation(String),

    #[error("invalid parameters for task '{task}': {source}")]
    Parameter {
        task: String,
        #[source]
        source: ParameterError,
    },

    #[error(
        "task '{task}' exceeded {resource} limit (limit: {limit:.1}{unit}, observed: {observed:.1}{unit})",
        unit = .resource.unit()
    )]
    ResourceExhausted {
        task: String,
        resource: ResourceKind,
        limit: f64,
        observed: f64,
    },

    #[error("task '{task}' exceeded timeout of {}s", .timeout.as_secs_f64())]
    FunctionTimeout { task: String, timeout: Duration },

    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("error in task '{task}': {source:#}")]
    Execution {
        task: String,
        #[source]
        source: anyhow::Error,
    },
}

impl WorkflowError {
    /// Name of the task the error is attributed to, for runtime failures.
    pub fn task(&self) -> Option<&str> {
        match self {
            Self::Parameter { task, .. }
            | Self::ResourceExhausted { task, .. }
            | Self::FunctionTimeout { task, .. }
            | Self::Execution { task, .. } => Some(task),
            _ => None,
        }
    }

    /// True for errors detected before any task body runs.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::DuplicateTask(_)
                | Self::MissingDependency(_)
                | Self::CyclicDependency(_)
                | Self::Validation(_)
                | Self::Parameter { .. }
        )
    }

    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::DuplicateTask(_) | Self::Validation(_) => ErrorCode::ValidationError,
            Self::MissingDependency(_) => ErrorCode::DependencyError,
            Self::CyclicDependency(_) => ErrorCode::CircularDependency,
            Self::Parameter { .. } => ErrorCode::ParameterError,
            Self::ResourceExhausted { .. } => ErrorCode::ResourceExhausted,
            Self::FunctionTimeout { .. } => ErrorCode::Timeout,
            Self::Checkpoint(_) => ErrorCode::CheckpointError,
            Self::Execution { .. } => ErrorCode::TaskFailed,
        }
    }

    pub(crate) fn execution(task: &str, source: anyhow::Error) -> Self {
        Self::Execution {
            task: task.to_string(),
            source,
        }
    }
}

fn format_missing(missing: &BTreeMap<String, Vec<String>>) -> String {
    missing
        .iter()
        .map(|(task, deps)| format!("- {} requires: {}", task, deps.join(", ")))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_dependency_lists_every_task() {
        let mut missing = BTreeMap::new();
        missing.insert("report".to_string(), vec!["load".to_string()]);
        missing.insert("train".to_string(), vec!["clean".to_string(), "split".to_string()]);

        let msg = WorkflowError::MissingDependency(missing).to_string();
        assert!(msg.contains("- report requires: load"));
        assert!(msg.contains("- train requires: clean, split"));
    }

    #[test]
    fn resource_exhausted_names_task_and_values() {
        let err = WorkflowError::ResourceExhausted {
            task: "crunch".into(),
            resource: ResourceKind::Memory,
            limit: 1.0,
            observed: 42.25,
        };
        let msg = err.to_string();
        assert!(msg.contains("'crunch'"));
        assert!(msg.contains("memory limit"));
        assert!(msg.contains("1.0MB"));
        assert!(msg.contains("42.2MB") || msg.contains("42.3MB"));
        assert_eq!(err.task(), Some("crunch"));
        assert_eq!(err.error_code(), ErrorCode::ResourceExhausted);
    }

    #[test]
    fn timeout_reports_budget_in_seconds() {
        let err = WorkflowError::FunctionTimeout {
            task: "slow".into(),
            timeout: Duration::from_secs(1),
        };
        assert_eq!(err.to_string(), "task 'slow' exceeded timeout of 1s");
        assert!(!err.is_validation());
    }
}
