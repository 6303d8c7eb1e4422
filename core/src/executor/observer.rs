use std::time::Duration;

use super::types::ExecutionResult;

/// Receives execution events (progress display, custom reporting).
///
/// Called inline from the executor; implementations must not block.
pub trait ExecutionObserver: Send + Sync {
    fn name(&self) -> &str;
    fn on_event(&self, event: &ExecutionEvent);
}

#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    RunStart {
        run_id: String,
        total_tasks: usize,
        total_levels: usize,
        restored: usize,
    },
    LevelStart {
        run_id: String,
        level: usize,
        tasks: Vec<String>,
    },
    TaskCached {
        run_id: String,
        task: String,
    },
    TaskStart {
        run_id: String,
        task: String,
        level: usize,
    },
    TaskComplete {
        run_id: String,
        task: String,
        duration: Duration,
    },
    TaskFailed {
        run_id: String,
        task: String,
        error: String,
    },
    LevelEnd {
        run_id: String,
        level: usize,
    },
    RunEnd {
        run_id: String,
        result: ExecutionResult,
    },
    RunFailed {
        run_id: String,
        error: String,
    },
}

impl ExecutionEvent {
    /// Short event name, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RunStart { .. } => "run_start",
            Self::LevelStart { .. } => "level_start",
            Self::TaskCached { .. } => "task_cached",
            Self::TaskStart { .. } => "task_start",
            Self::TaskComplete { .. } => "task_complete",
            Self::TaskFailed { .. } => "task_failed",
            Self::LevelEnd { .. } => "level_end",
            Self::RunEnd { .. } => "run_end",
            Self::RunFailed { .. } => "run_failed",
        }
    }
}
