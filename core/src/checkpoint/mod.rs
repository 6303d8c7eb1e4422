//! Checkpoint persistence and resume.
//!
//! A checkpoint is the set of completed task results for one parameter set,
//! keyed by [`CheckpointKey`]. The executor loads it once at run start and
//! rewrites it after every successful task, so a failed or interrupted run
//! can be retried with the same parameters and skip finished work.
//!
//! ```text
//! <dir>/checkpoint_<sha256>.json          versioned result envelope
//! <dir>/checkpoint_<sha256>.status.json   run status sidecar
//! ```

mod envelope;
mod key;
mod status;
mod store;

pub use envelope::{CheckpointEnvelope, ResultEntry, CHECKPOINT_FORMAT_VERSION};
pub use key::{canonical_json, CheckpointKey};
pub use status::{RunStatus, StatusRecord};
pub use store::FileCheckpointStore;

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::CheckpointError;

/// Completed results by task name.
pub type Results = BTreeMap<String, Value>;

/// Backend the executor persists results to.
///
/// `save` must write the results and the status record together; callers
/// serialize concurrent saves for the same run.
pub trait CheckpointStore: Send + Sync {
    /// Results saved for `key`, empty when no checkpoint exists.
    fn load(&self, key: &CheckpointKey) -> Result<Results, CheckpointError>;

    fn save(
        &self,
        key: &CheckpointKey,
        results: &Results,
        status: &StatusRecord,
    ) -> Result<(), CheckpointError>;

    /// Rewrite only the status sidecar.
    fn write_status(&self, key: &CheckpointKey, status: &StatusRecord)
        -> Result<(), CheckpointError>;

    fn status(&self, key: &CheckpointKey) -> Result<Option<StatusRecord>, CheckpointError>;

    /// Remove the checkpoint for `key`. Returns false when none existed.
    fn clear(&self, key: &CheckpointKey) -> Result<bool, CheckpointError>;
}
