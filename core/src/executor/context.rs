use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::{watch, Mutex};
use tracing::warn;

use crate::checkpoint::{CheckpointKey, CheckpointStore, Results, RunStatus, StatusRecord};
use crate::error::WorkflowError;
use crate::params::Params;

/// What a task body receives on each invocation.
#[derive(Debug, Clone)]
pub struct TaskContext {
    run_id: Arc<str>,
    task: String,
    params: Params,
    inputs: BTreeMap<String, Value>,
    cancel: watch::Receiver<bool>,
}

impl TaskContext {
    pub(crate) fn new(
        run_id: Arc<str>,
        task: &str,
        params: Params,
        inputs: BTreeMap<String, Value>,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        Self {
            run_id,
            task: task.to_string(),
            params,
            inputs,
            cancel,
        }
    }

    /// Context that is never cancelled, for calling a body outside a run.
    pub fn standalone(task: &str, params: Params, inputs: BTreeMap<String, Value>) -> Self {
        let (_tx, rx) = watch::channel(false);
        Self::new(Arc::from("standalone"), task, params, inputs, rx)
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    /// Parameters after validation against the task's schema.
    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    /// Result of a direct dependency.
    pub fn input(&self, dependency: &str) -> Option<&Value> {
        self.inputs.get(dependency)
    }

    pub fn inputs(&self) -> &BTreeMap<String, Value> {
        &self.inputs
    }

    /// True once a guard has given up on this invocation.
    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Resolves when a guard gives up on this invocation. Never resolves if
    /// the run finishes without cancelling it.
    pub async fn cancelled(&self) {
        let mut rx = self.cancel.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                futures::future::pending::<()>().await;
            }
        }
    }
}

/// Mutable state of one run, guarded by the run's single lock.
#[derive(Debug)]
pub(crate) struct RunState {
    pub(crate) results: Results,
    pub(crate) executed: Vec<String>,
    pub(crate) timings: BTreeMap<String, Duration>,
    pub(crate) status: RunStatus,
}

/// Per-`run()` state. Created at run start, dropped at run end, never
/// shared between runs.
pub(crate) struct RunContext {
    run_id: Arc<str>,
    params: Params,
    task_params: BTreeMap<String, Params>,
    key: CheckpointKey,
    store: Option<Arc<dyn CheckpointStore>>,
    state: Mutex<RunState>,
}

impl RunContext {
    pub(crate) fn new(
        run_id: &str,
        params: Params,
        task_params: BTreeMap<String, Params>,
        key: CheckpointKey,
        store: Option<Arc<dyn CheckpointStore>>,
        restored: Results,
    ) -> Self {
        Self {
            run_id: Arc::from(run_id),
            params,
            task_params,
            key,
            store,
            state: Mutex::new(RunState {
                results: restored,
                executed: Vec::new(),
                timings: BTreeMap::new(),
                status: RunStatus::Running,
            }),
        }
    }

    pub(crate) fn run_id(&self) -> &str {
        &self.run_id
    }

    pub(crate) fn shared_run_id(&self) -> Arc<str> {
        self.run_id.clone()
    }

    pub(crate) fn key(&self) -> &CheckpointKey {
        &self.key
    }

    pub(crate) fn params_for(&self, task: &str) -> Params {
        self.task_params
            .get(task)
            .cloned()
            .unwrap_or_else(|| self.params.clone())
    }

    pub(crate) async fn is_done(&self, task: &str) -> bool {
        self.state.lock().await.results.contains_key(task)
    }

    /// Snapshot of the named results that exist so far.
    pub(crate) async fn results_for<'a, I>(&self, tasks: I) -> BTreeMap<String, Value>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let state = self.state.lock().await;
        tasks
            .into_iter()
            .filter_map(|name| state.results.get(name).map(|v| (name.clone(), v.clone())))
            .collect()
    }

    /// Record a successful completion and persist the checkpoint.
    ///
    /// Check, save and insert happen under one lock so concurrent completions
    /// in a level never interleave their checkpoint writes. The run state only
    /// takes the result once the save succeeded, so a failed save leaves the
    /// status sidecar in agreement with the results file.
    pub(crate) async fn commit(
        &self,
        task: &str,
        value: Value,
        elapsed: Duration,
    ) -> Result<(), WorkflowError> {
        let mut state = self.state.lock().await;
        if state.results.contains_key(task) {
            warn!(run_id = %self.run_id, task, "result already recorded; keeping the first");
            return Ok(());
        }

        if let Some(store) = &self.store {
            let mut next = state.results.clone();
            next.insert(task.to_string(), value);
            let record = self.status_record(state.status, &next);
            // Synchronous write on the worker thread; one save per completed task.
            store.save(&self.key, &next, &record)?;
            state.results = next;
        } else {
            state.results.insert(task.to_string(), value);
        }
        state.executed.push(task.to_string());
        state.timings.insert(task.to_string(), elapsed);
        Ok(())
    }

    /// Update the run status and rewrite the sidecar.
    pub(crate) async fn set_status(&self, status: RunStatus) -> Result<(), WorkflowError> {
        let mut state = self.state.lock().await;
        state.status = status;
        if let Some(store) = &self.store {
            let record = self.status_record(state.status, &state.results);
            store.write_status(&self.key, &record)?;
        }
        Ok(())
    }

    pub(crate) async fn snapshot(&self) -> (Results, Vec<String>, BTreeMap<String, Duration>) {
        let state = self.state.lock().await;
        (
            state.results.clone(),
            state.executed.clone(),
            state.timings.clone(),
        )
    }

    fn status_record(&self, status: RunStatus, results: &Results) -> StatusRecord {
        StatusRecord {
            run_id: self.run_id.to_string(),
            status,
            parameters: self.params.clone(),
            last_updated: Utc::now(),
            completed_tasks: results.keys().cloned().collect(),
        }
    }
}
