use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;

use crate::checkpoint::{CheckpointKey, CheckpointStore, Results, RunStatus};
use crate::error::WorkflowError;
use crate::guard::{enforce_limits, enforce_timeout, CancelSignal, ResourceProbe, SysinfoProbe};
use crate::params::Params;
use crate::util::generate_run_id;

use super::context::{RunContext, TaskContext};
use super::graph::{TaskGraph, TaskNode};
use super::observer::{ExecutionEvent, ExecutionObserver};
use super::plan::ExecutionPlan;
use super::scheduler::execute_level_parallel;
use super::types::{ExecutionOpts, ExecutionResult, TaskFn};

/// Execution engine for a validated task graph.
///
/// One engine can serve many `run()` calls; each call owns its own
/// [`RunContext`], so runs with different parameters never share results.
pub struct ExecutionEngine {
    graph: TaskGraph,
    plan: ExecutionPlan,
    opts: ExecutionOpts,
    store: Option<Arc<dyn CheckpointStore>>,
    probe: Arc<dyn ResourceProbe>,
    observer: Option<Arc<dyn ExecutionObserver>>,
}

pub struct ExecutionEngineBuilder {
    graph: TaskGraph,
    opts: ExecutionOpts,
    store: Option<Arc<dyn CheckpointStore>>,
    probe: Option<Arc<dyn ResourceProbe>>,
    observer: Option<Arc<dyn ExecutionObserver>>,
}

impl ExecutionEngine {
    pub fn builder(graph: TaskGraph) -> ExecutionEngineBuilder {
        ExecutionEngineBuilder::new(graph)
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    pub fn plan(&self) -> &ExecutionPlan {
        &self.plan
    }

    pub fn opts(&self) -> &ExecutionOpts {
        &self.opts
    }

    pub fn checkpoint_store(&self) -> Option<&Arc<dyn CheckpointStore>> {
        self.store.as_ref()
    }

    /// Run every task, level by level, and return all results.
    ///
    /// Parameters are validated for every task before anything runs or any
    /// checkpoint is touched. Results already in the checkpoint for these
    /// parameters are reused without invoking their tasks. The first task
    /// failure aborts the run; the checkpoint keeps everything that
    /// completed before it, so calling `run` again with the same parameters
    /// resumes from there.
    pub async fn run(&self, params: Params) -> Result<ExecutionResult, WorkflowError> {
        let started = Instant::now();
        let task_params = self.validate_params(&params)?;

        let run_id = generate_run_id();
        let key = CheckpointKey::for_params(&params);
        let restored = self.load_checkpoint(&key)?;
        let restored_count = restored.len();

        let ctx = RunContext::new(
            &run_id,
            params,
            task_params,
            key,
            self.store.clone(),
            restored,
        );

        tracing::info!(
            run_id = %run_id,
            checkpoint.key = %ctx.key(),
            tasks = self.graph.len(),
            levels = self.plan.len(),
            restored = restored_count,
            "workflow run started"
        );
        self.emit(ExecutionEvent::RunStart {
            run_id: run_id.clone(),
            total_tasks: self.graph.len(),
            total_levels: self.plan.len(),
            restored: restored_count,
        });

        match self.execute_levels(&ctx).await {
            Ok(cached) => {
                ctx.set_status(RunStatus::Succeeded).await?;
                let result = self.build_result(&ctx, cached, started).await;
                tracing::info!(
                    run_id = %run_id,
                    executed = result.executed.len(),
                    cached = result.cached.len(),
                    duration_ms = result.duration.as_millis() as u64,
                    "workflow run succeeded"
                );
                self.emit(ExecutionEvent::RunEnd {
                    run_id,
                    result: result.clone(),
                });
                Ok(result)
            }
            Err(err) => {
                tracing::error!(
                    run_id = %run_id,
                    error.kind = ?err.error_code(),
                    error.message = %err,
                    "workflow run failed"
                );
                if let Err(status_err) = ctx.set_status(RunStatus::Failed).await {
                    tracing::warn!(run_id = %run_id, error = %status_err, "could not record failed status");
                }
                self.emit(ExecutionEvent::RunFailed {
                    run_id,
                    error: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Execute all levels in order. Returns the tasks served from cache.
    async fn execute_levels(&self, ctx: &RunContext) -> Result<Vec<String>, WorkflowError> {
        let mut cached = Vec::new();

        for (level, names) in self.plan.levels().iter().enumerate() {
            let mut to_run = Vec::new();
            for name in names {
                if ctx.is_done(name).await {
                    tracing::debug!(run_id = %ctx.run_id(), task = %name, "using cached result");
                    self.emit(ExecutionEvent::TaskCached {
                        run_id: ctx.run_id().to_string(),
                        task: name.clone(),
                    });
                    cached.push(name.clone());
                } else {
                    to_run.push(name.clone());
                }
            }

            if to_run.is_empty() {
                tracing::debug!(run_id = %ctx.run_id(), level, "level fully cached");
                continue;
            }

            tracing::info!(run_id = %ctx.run_id(), level, tasks = to_run.len(), "level started");
            self.emit(ExecutionEvent::LevelStart {
                run_id: ctx.run_id().to_string(),
                level,
                tasks: to_run.clone(),
            });

            if let [only] = to_run.as_slice() {
                self.run_task(ctx, only, level, false).await?;
            } else {
                execute_level_parallel(&to_run, self.opts.max_workers, move |name| async move {
                    self.run_task(ctx, &name, level, true).await
                })
                .await?;
            }

            self.emit(ExecutionEvent::LevelEnd {
                run_id: ctx.run_id().to_string(),
                level,
            });
        }

        Ok(cached)
    }

    /// Run one task and commit its result.
    async fn run_task(
        &self,
        ctx: &RunContext,
        name: &str,
        level: usize,
        isolate: bool,
    ) -> Result<(), WorkflowError> {
        let node = self.graph.get(name).ok_or_else(|| {
            WorkflowError::Validation(format!("task '{name}' is not part of the graph"))
        })?;

        tracing::info!(run_id = %ctx.run_id(), task = %name, level, "task started");
        self.emit(ExecutionEvent::TaskStart {
            run_id: ctx.run_id().to_string(),
            task: name.to_string(),
            level,
        });

        let started = Instant::now();
        match self.execute_task(ctx, node, isolate).await {
            Ok(value) => {
                let elapsed = started.elapsed();
                ctx.commit(name, value, elapsed).await?;
                tracing::info!(
                    run_id = %ctx.run_id(),
                    task = %name,
                    duration_ms = elapsed.as_millis() as u64,
                    "task completed"
                );
                self.emit(ExecutionEvent::TaskComplete {
                    run_id: ctx.run_id().to_string(),
                    task: name.to_string(),
                    duration: elapsed,
                });
                Ok(())
            }
            Err(err) => {
                tracing::error!(
                    run_id = %ctx.run_id(),
                    task = %name,
                    error.kind = ?err.error_code(),
                    error.message = %err,
                    "task failed"
                );
                self.emit(ExecutionEvent::TaskFailed {
                    run_id: ctx.run_id().to_string(),
                    task: name.to_string(),
                    error: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Invoke a task body through its guards: resource inside, timeout
    /// outside. Guarded or pooled bodies are spawned, so a guard that gives
    /// up leaves the body running detached instead of dropping it mid-poll.
    async fn execute_task(
        &self,
        ctx: &RunContext,
        node: &TaskNode,
        isolate: bool,
    ) -> Result<Value, WorkflowError> {
        let name = node.name();
        let inputs = ctx.results_for(node.dependencies()).await;
        let (cancel, cancel_rx) = CancelSignal::new();
        let task_ctx = TaskContext::new(
            ctx.shared_run_id(),
            name,
            ctx.params_for(name),
            inputs,
            cancel_rx,
        );

        let body = invoke(node.func.clone(), name.to_string(), task_ctx);
        let limits = node.limits();
        let timeout = node.timeout();
        let guarded = timeout.is_some() || !limits.is_unbounded();

        let mut work: BoxFuture<'_, Result<Value, WorkflowError>> = if guarded || isolate {
            let handle = tokio::spawn(body);
            let task = name.to_string();
            Box::pin(async move {
                match handle.await {
                    Ok(res) => res,
                    Err(e) => Err(WorkflowError::execution(
                        &task,
                        anyhow::anyhow!("task did not complete: {e}"),
                    )),
                }
            })
        } else {
            Box::pin(body)
        };

        if !limits.is_unbounded() {
            work = Box::pin(enforce_limits(
                name,
                limits,
                self.probe.clone(),
                self.opts.sample_interval,
                cancel.clone(),
                work,
            ));
        }
        if let Some(timeout) = timeout {
            work = Box::pin(enforce_timeout(name, timeout, cancel, work));
        }

        work.await
    }

    fn validate_params(&self, params: &Params) -> Result<BTreeMap<String, Params>, WorkflowError> {
        let mut validated = BTreeMap::new();
        for node in self.graph.nodes() {
            let task_params = match node.param_schema() {
                Some(schema) => {
                    schema
                        .validate(params)
                        .map_err(|source| WorkflowError::Parameter {
                            task: node.name().to_string(),
                            source,
                        })?
                }
                None => params.clone(),
            };
            validated.insert(node.name().to_string(), task_params);
        }
        Ok(validated)
    }

    fn load_checkpoint(&self, key: &CheckpointKey) -> Result<Results, WorkflowError> {
        let Some(store) = &self.store else {
            return Ok(Results::new());
        };

        let mut restored = store.load(key)?;
        restored.retain(|task, _| {
            let known = self.graph.contains(task);
            if !known {
                tracing::warn!(checkpoint.key = %key, task = %task, "ignoring checkpointed result for unknown task");
            }
            known
        });
        Ok(restored)
    }

    async fn build_result(
        &self,
        ctx: &RunContext,
        cached: Vec<String>,
        started: Instant,
    ) -> ExecutionResult {
        let (results, executed, timings) = ctx.snapshot().await;
        ExecutionResult {
            run_id: ctx.run_id().to_string(),
            checkpoint_key: ctx.key().clone(),
            results,
            executed,
            cached,
            timings,
            levels: self.plan.to_vecs(),
            duration: started.elapsed(),
        }
    }

    fn emit(&self, event: ExecutionEvent) {
        if let Some(observer) = &self.observer {
            tracing::trace!(
                observer = observer.name(),
                event = event.kind(),
                "notifying observer"
            );
            observer.on_event(&event);
        }
    }
}

impl ExecutionEngineBuilder {
    pub fn new(graph: TaskGraph) -> Self {
        Self {
            graph,
            opts: ExecutionOpts::default(),
            store: None,
            probe: None,
            observer: None,
        }
    }

    pub fn opts(mut self, opts: ExecutionOpts) -> Self {
        self.opts = opts;
        self
    }

    pub fn max_workers(mut self, max_workers: usize) -> Self {
        self.opts.max_workers = max_workers.max(1);
        self
    }

    pub fn sample_interval(mut self, interval: std::time::Duration) -> Self {
        self.opts.sample_interval = interval;
        self
    }

    /// Persist results here after every successful task. Without a store
    /// results are only memoized within a single run.
    pub fn checkpoint_store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Override the resource sampler (defaults to [`SysinfoProbe`]).
    pub fn resource_probe(mut self, probe: Arc<dyn ResourceProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn build(self) -> Result<ExecutionEngine, WorkflowError> {
        let plan = self.graph.execution_plan()?;
        if let Some(observer) = &self.observer {
            tracing::debug!(observer = observer.name(), "observer attached");
        }
        let probe = self
            .probe
            .unwrap_or_else(|| Arc::new(SysinfoProbe::new()) as Arc<dyn ResourceProbe>);

        Ok(ExecutionEngine {
            graph: self.graph,
            plan,
            opts: self.opts,
            store: self.store,
            probe,
            observer: self.observer,
        })
    }
}

/// Call the body, turning errors and panics into errors attributed to `task`.
async fn invoke(func: TaskFn, task: String, ctx: TaskContext) -> Result<Value, WorkflowError> {
    let fut = match std::panic::catch_unwind(AssertUnwindSafe(|| func(ctx))) {
        Ok(fut) => fut,
        Err(panic) => return Err(panicked(&task, panic)),
    };

    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => Err(WorkflowError::execution(&task, source)),
        Err(panic) => Err(panicked(&task, panic)),
    }
}

fn panicked(task: &str, panic: Box<dyn Any + Send>) -> WorkflowError {
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    WorkflowError::execution(task, anyhow::anyhow!("task panicked: {message}"))
}
