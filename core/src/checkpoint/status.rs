use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::params::Params;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Succeeded,
    Failed,
}

/// Sidecar describing the last run that wrote a checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub run_id: String,
    pub status: RunStatus,
    pub parameters: Params,
    pub last_updated: DateTime<Utc>,
    pub completed_tasks: Vec<String>,
}
