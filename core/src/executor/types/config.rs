use std::time::Duration;

use crate::config::ExecutorConfig;

/// Execution options for the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOpts {
    /// Maximum parallel tasks within one level
    pub max_workers: usize,

    /// Resource guard sampling period
    pub sample_interval: Duration,
}

impl ExecutionOpts {
    pub fn from_config(cfg: &ExecutorConfig) -> Self {
        Self {
            max_workers: cfg.max_workers.max(1),
            sample_interval: Duration::from_millis(cfg.sample_interval_ms.max(1)),
        }
    }
}

impl Default for ExecutionOpts {
    fn default() -> Self {
        Self::from_config(&ExecutorConfig::default())
    }
}
