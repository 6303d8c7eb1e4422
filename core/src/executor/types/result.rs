use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::Value;

use crate::checkpoint::CheckpointKey;

/// Result of one successful `run()`.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub run_id: String,

    /// Key the run's checkpoint is stored under
    pub checkpoint_key: CheckpointKey,

    /// Every task's result, executed in this run or restored from a checkpoint
    pub results: BTreeMap<String, Value>,

    /// Tasks whose body ran in this run, in completion order
    pub executed: Vec<String>,

    /// Tasks served from the checkpoint without running
    pub cached: Vec<String>,

    /// Wall-clock time of each executed task
    pub timings: BTreeMap<String, Duration>,

    /// Execution levels, in order
    pub levels: Vec<Vec<String>>,

    /// Total run duration
    pub duration: Duration,
}

impl ExecutionResult {
    pub fn get(&self, task: &str) -> Option<&Value> {
        self.results.get(task)
    }

    pub fn total_tasks(&self) -> usize {
        self.results.len()
    }

    pub fn was_cached(&self, task: &str) -> bool {
        self.cached.iter().any(|t| t == task)
    }
}
