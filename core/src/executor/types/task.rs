use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::executor::context::TaskContext;
use crate::guard::ResourceLimits;
use crate::params::ParamSchema;

/// Boxed future returned by a task body.
pub type TaskFuture = BoxFuture<'static, anyhow::Result<Value>>;

/// Type-erased task body.
pub type TaskFn = Arc<dyn Fn(TaskContext) -> TaskFuture + Send + Sync>;

/// Declaration of one unit of work, consumed by [`WorkflowBuilder`].
///
/// [`WorkflowBuilder`]: crate::executor::WorkflowBuilder
#[derive(Clone)]
pub struct TaskSpec {
    pub(crate) name: String,
    pub(crate) dependencies: Vec<String>,
    pub(crate) func: TaskFn,
    pub(crate) timeout: Option<Duration>,
    pub(crate) limits: ResourceLimits,
    pub(crate) params: Option<ParamSchema>,
}

impl TaskSpec {
    /// Task with an async body.
    pub fn new<F, Fut>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
            func: Arc::new(move |ctx| Box::pin(func(ctx))),
            timeout: None,
            limits: ResourceLimits::default(),
            params: None,
        }
    }

    /// Task with a synchronous body, run on the blocking thread pool.
    pub fn blocking<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(TaskContext) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        let func = Arc::new(func);
        Self::new(name, move |ctx| {
            let func = func.clone();
            async move {
                match tokio::task::spawn_blocking(move || func(ctx)).await {
                    Ok(res) => res,
                    Err(e) if e.is_panic() => Err(anyhow::anyhow!("task body panicked")),
                    Err(e) => Err(anyhow::Error::new(e).context("blocking task did not complete")),
                }
            }
        })
    }

    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.extend(deps.into_iter().map(Into::into));
        self
    }

    /// Wall-clock budget. Exceeding it stops waiting; the body is not killed.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn memory_limit_mb(mut self, limit: f64) -> Self {
        self.limits.memory_limit_mb = Some(limit);
        self
    }

    pub fn cpu_limit_percent(mut self, limit: f64) -> Self {
        self.limits.cpu_limit_percent = Some(limit);
        self
    }

    pub fn params(mut self, schema: ParamSchema) -> Self {
        self.params = Some(schema);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for TaskSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSpec")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("timeout", &self.timeout)
            .field("limits", &self.limits)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}
