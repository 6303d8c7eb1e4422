use std::future::Future;
use std::sync::Arc;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use tokio::sync::Semaphore;

use crate::error::WorkflowError;

/// Execute the tasks of one level concurrently.
///
/// # Arguments
///
/// * `task_names` - Tasks of this level that still need to run
/// * `max_workers` - Configured pool size; the effective size is
///   `min(max_workers, task_names.len())`
/// * `executor_fn` - Runs and commits a single task
///
/// Returns on the first error without waiting for the rest. Their futures are
/// dropped, so anything they would have committed is discarded.
pub async fn execute_level_parallel<F, Fut>(
    task_names: &[String],
    max_workers: usize,
    executor_fn: F,
) -> Result<(), WorkflowError>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<(), WorkflowError>>,
{
    let workers = pool_size(max_workers, task_names.len());
    let sem = Arc::new(Semaphore::new(workers));
    let mut futs: FuturesUnordered<_> = FuturesUnordered::new();

    for name in task_names {
        let sem = sem.clone();
        let work = executor_fn(name.clone());
        let name = name.clone();

        futs.push(async move {
            let _permit = sem.acquire_owned().await.map_err(|_| {
                WorkflowError::execution(&name, anyhow::anyhow!("worker pool closed unexpectedly"))
            })?;

            work.await
        });
    }

    while let Some(res) = futs.next().await {
        res?;
    }

    Ok(())
}

pub(crate) fn pool_size(max_workers: usize, level_width: usize) -> usize {
    max_workers.min(level_width).max(1)
}
