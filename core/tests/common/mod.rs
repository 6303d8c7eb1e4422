#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use taskflow_core::executor::{ExecutionEvent, ExecutionObserver};
use taskflow_core::{CheckpointStore, FileCheckpointStore, Params, TaskContext, TaskSpec};
use tempfile::TempDir;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

pub fn file_store(dir: &TempDir) -> Arc<FileCheckpointStore> {
    Arc::new(FileCheckpointStore::new(dir.path()).unwrap())
}

pub fn as_store(store: &Arc<FileCheckpointStore>) -> Arc<dyn CheckpointStore> {
    store.clone()
}

pub fn params(pairs: &[(&str, Value)]) -> Params {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Counts how many times task bodies were invoked.
#[derive(Clone, Default)]
pub struct Calls(Arc<AtomicUsize>);

impl Calls {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Task returning `value`, counting each invocation.
pub fn counted(name: &str, calls: &Calls, value: Value) -> TaskSpec {
    let calls = calls.clone();
    TaskSpec::new(name, move |_ctx| {
        let calls = calls.clone();
        let value = value.clone();
        async move {
            calls.hit();
            Ok(value)
        }
    })
}

/// Task that always fails, counting each invocation.
pub fn failing(name: &str, calls: &Calls) -> TaskSpec {
    let calls = calls.clone();
    TaskSpec::new(name, move |ctx: TaskContext| {
        let calls = calls.clone();
        async move {
            calls.hit();
            Err(anyhow::anyhow!(
                "{} could not reach the warehouse",
                ctx.task()
            ))
        }
    })
}

/// Task that sleeps for `dur` and then returns its own name.
pub fn sleeping(name: &str, dur: Duration) -> TaskSpec {
    TaskSpec::new(name, move |ctx: TaskContext| async move {
        tokio::time::sleep(dur).await;
        Ok(json!(ctx.task()))
    })
}

/// Start and end instants of every task body.
#[derive(Clone, Default)]
pub struct Timeline(Arc<Mutex<BTreeMap<String, (Instant, Instant)>>>);

impl Timeline {
    /// Task that sleeps for `dur` and records when its body ran.
    pub fn task(&self, name: &str, dur: Duration) -> TaskSpec {
        let timeline = self.clone();
        TaskSpec::new(name, move |ctx: TaskContext| {
            let timeline = timeline.clone();
            async move {
                let start = Instant::now();
                tokio::time::sleep(dur).await;
                let end = Instant::now();
                timeline
                    .0
                    .lock()
                    .unwrap()
                    .insert(ctx.task().to_string(), (start, end));
                Ok(json!(ctx.task()))
            }
        })
    }

    pub fn span(&self, name: &str) -> (Instant, Instant) {
        self.0.lock().unwrap()[name]
    }
}

/// Observer that keeps a compact log of events.
#[derive(Default)]
pub struct EventLog(Mutex<Vec<String>>);

impl EventLog {
    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl ExecutionObserver for EventLog {
    fn name(&self) -> &str {
        "event-log"
    }

    fn on_event(&self, event: &ExecutionEvent) {
        let line = match event {
            ExecutionEvent::RunStart { restored, .. } => format!("run_start restored={restored}"),
            ExecutionEvent::LevelStart { level, tasks, .. } => {
                format!("level_start {level} [{}]", tasks.join(","))
            }
            ExecutionEvent::TaskCached { task, .. } => format!("cached {task}"),
            ExecutionEvent::TaskStart { task, .. } => format!("start {task}"),
            ExecutionEvent::TaskComplete { task, .. } => format!("complete {task}"),
            ExecutionEvent::TaskFailed { task, .. } => format!("failed {task}"),
            ExecutionEvent::LevelEnd { level, .. } => format!("level_end {level}"),
            ExecutionEvent::RunEnd { .. } => "run_end".to_string(),
            ExecutionEvent::RunFailed { .. } => "run_failed".to_string(),
        };
        self.0.lock().unwrap().push(line);
    }
}
