use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use super::envelope::{CheckpointEnvelope, CHECKPOINT_FORMAT_VERSION};
use super::status::StatusRecord;
use super::{CheckpointKey, CheckpointStore, Results};
use crate::error::CheckpointError;

const FILE_PREFIX: &str = "checkpoint_";
const STATUS_SUFFIX: &str = ".status.json";
const RESULTS_SUFFIX: &str = ".json";

/// Checkpoint store backed by JSON files in one directory.
pub struct FileCheckpointStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileCheckpointStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn new<P: Into<PathBuf>>(dir: P) -> Result<Self, CheckpointError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| CheckpointError::io(&dir, e))?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn results_path(&self, key: &CheckpointKey) -> PathBuf {
        self.dir
            .join(format!("{FILE_PREFIX}{}{RESULTS_SUFFIX}", key.as_str()))
    }

    pub fn status_path(&self, key: &CheckpointKey) -> PathBuf {
        self.dir
            .join(format!("{FILE_PREFIX}{}{STATUS_SUFFIX}", key.as_str()))
    }

    /// Keys with a results file, most recently modified first.
    pub fn list(&self) -> Result<Vec<CheckpointKey>, CheckpointError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| CheckpointError::io(&self.dir, e))?;

        let mut found = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CheckpointError::io(&self.dir, e))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|s| s.to_str()) else {
                continue;
            };
            if name.ends_with(STATUS_SUFFIX) {
                continue;
            }
            let key = name
                .strip_prefix(FILE_PREFIX)
                .and_then(|rest| rest.strip_suffix(RESULTS_SUFFIX))
                .and_then(CheckpointKey::parse);
            if let Some(key) = key {
                let modified = fs::metadata(&path).and_then(|m| m.modified()).ok();
                found.push((modified, key));
            }
        }

        found.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(found.into_iter().map(|(_, key)| key).collect())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        match self.write_lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn load(&self, key: &CheckpointKey) -> Result<Results, CheckpointError> {
        let path = self.results_path(key);
        let Some(envelope) = read_json::<CheckpointEnvelope>(&path)? else {
            return Ok(Results::new());
        };

        let found = envelope.max_format_version();
        if found > CHECKPOINT_FORMAT_VERSION {
            return Err(CheckpointError::UnsupportedVersion {
                path,
                found,
                supported: CHECKPOINT_FORMAT_VERSION,
            });
        }

        let results = envelope.into_results();
        info!(key = %key, tasks = results.len(), "loaded checkpoint");
        Ok(results)
    }

    fn save(
        &self,
        key: &CheckpointKey,
        results: &Results,
        status: &StatusRecord,
    ) -> Result<(), CheckpointError> {
        let envelope = CheckpointEnvelope::new(key, results);
        let _guard = self.lock();
        write_json_atomic(&self.results_path(key), &envelope)?;
        write_json_atomic(&self.status_path(key), status)?;
        debug!(key = %key, tasks = results.len(), "saved checkpoint");
        Ok(())
    }

    fn write_status(
        &self,
        key: &CheckpointKey,
        status: &StatusRecord,
    ) -> Result<(), CheckpointError> {
        let _guard = self.lock();
        write_json_atomic(&self.status_path(key), status)
    }

    fn status(&self, key: &CheckpointKey) -> Result<Option<StatusRecord>, CheckpointError> {
        read_json(&self.status_path(key))
    }

    fn clear(&self, key: &CheckpointKey) -> Result<bool, CheckpointError> {
        let _guard = self.lock();
        let removed = remove_if_exists(&self.results_path(key))?;
        remove_if_exists(&self.status_path(key))?;
        Ok(removed)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, CheckpointError> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(CheckpointError::io(path, e)),
    };
    serde_json::from_slice(&raw)
        .map(Some)
        .map_err(|e| CheckpointError::serialize(path, e))
}

/// Write to a sibling temp file, then rename over `path`.
fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), CheckpointError> {
    let json = serde_json::to_vec_pretty(value).map_err(|e| CheckpointError::serialize(path, e))?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).map_err(|e| CheckpointError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| CheckpointError::io(path, e))
}

fn remove_if_exists(path: &Path) -> Result<bool, CheckpointError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(CheckpointError::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::RunStatus;
    use crate::params::Params;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn status(completed: &[&str]) -> StatusRecord {
        StatusRecord {
            run_id: "run-test".to_string(),
            status: RunStatus::Running,
            parameters: Params::new(),
            last_updated: Utc::now(),
            completed_tasks: completed.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn key(value: i64) -> CheckpointKey {
        let mut params = Params::new();
        params.insert("value".into(), json!(value));
        CheckpointKey::for_params(&params)
    }

    #[test]
    fn load_without_checkpoint_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileCheckpointStore::new(dir.path()).unwrap();
        assert!(store.load(&key(1)).unwrap().is_empty());
        assert!(store.status(&key(1)).unwrap().is_none());
    }

    #[test]
    fn save_then_load_restores_results_and_status() {
        let dir = TempDir::new().unwrap();
        let store = FileCheckpointStore::new(dir.path()).unwrap();
        let k = key(7);

        let mut results = Results::new();
        results.insert("extract".into(), json!({"rows": 3}));
        results.insert("load".into(), json!("ok"));
        store.save(&k, &results, &status(&["extract", "load"])).unwrap();

        assert_eq!(store.load(&k).unwrap(), results);
        let record = store.status(&k).unwrap().unwrap();
        assert_eq!(record.completed_tasks, vec!["extract", "load"]);
        assert!(store.results_path(&k).exists());
        assert!(store.status_path(&k).exists());
        assert!(!store.results_path(&k).with_extension("json.tmp").exists());
    }

    #[test]
    fn list_and_clear() {
        let dir = TempDir::new().unwrap();
        let store = FileCheckpointStore::new(dir.path()).unwrap();
        store.save(&key(1), &Results::new(), &status(&[])).unwrap();
        store.save(&key(2), &Results::new(), &status(&[])).unwrap();

        let mut listed = store.list().unwrap();
        listed.sort();
        let mut expected = vec![key(1), key(2)];
        expected.sort();
        assert_eq!(listed, expected);

        assert!(store.clear(&key(1)).unwrap());
        assert!(!store.clear(&key(1)).unwrap());
        assert_eq!(store.list().unwrap(), vec![key(2)]);
    }

    #[test]
    fn newer_format_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = FileCheckpointStore::new(dir.path()).unwrap();
        let k = key(3);
        let mut envelope = CheckpointEnvelope::new(&k, &Results::new());
        envelope.format_version = CHECKPOINT_FORMAT_VERSION + 1;
        fs::write(
            store.results_path(&k),
            serde_json::to_vec(&envelope).unwrap(),
        )
        .unwrap();

        match store.load(&k) {
            Err(CheckpointError::UnsupportedVersion { found, .. }) => {
                assert_eq!(found, CHECKPOINT_FORMAT_VERSION + 1)
            }
            other => panic!("expected UnsupportedVersion, got {other:?}"),
        }
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = FileCheckpointStore::new(dir.path()).unwrap();
        let k = key(4);
        fs::write(store.results_path(&k), b"{ not json").unwrap();
        assert!(matches!(
            store.load(&k),
            Err(CheckpointError::Serialize { .. })
        ));
    }
}
