use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{CheckpointKey, Results};

/// Highest checkpoint format this build reads and the one it writes.
pub const CHECKPOINT_FORMAT_VERSION: u32 = 1;

/// On-disk form of a checkpoint's results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointEnvelope {
    pub format_version: u32,
    pub key: CheckpointKey,
    pub saved_at: DateTime<Utc>,
    pub entries: Vec<ResultEntry>,
}

/// One task's result, tagged with the task name and format version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEntry {
    pub task: String,
    pub format_version: u32,
    pub value: Value,
}

impl CheckpointEnvelope {
    pub fn new(key: &CheckpointKey, results: &Results) -> Self {
        Self {
            format_version: CHECKPOINT_FORMAT_VERSION,
            key: key.clone(),
            saved_at: Utc::now(),
            entries: results
                .iter()
                .map(|(task, value)| ResultEntry {
                    task: task.clone(),
                    format_version: CHECKPOINT_FORMAT_VERSION,
                    value: value.clone(),
                })
                .collect(),
        }
    }

    /// Newest format version found in the envelope or any entry.
    pub fn max_format_version(&self) -> u32 {
        self.entries
            .iter()
            .map(|e| e.format_version)
            .fold(self.format_version, u32::max)
    }

    pub fn into_results(self) -> Results {
        self.entries
            .into_iter()
            .map(|entry| (entry.task, entry.value))
            .collect()
    }
}
