use std::future::Future;
use std::time::Duration;

use serde_json::Value;
use tracing::warn;

use super::CancelSignal;
use crate::error::WorkflowError;

/// Await `work` for at most `timeout`.
///
/// On expiry this stops waiting and returns `FunctionTimeout`. It does not
/// stop the underlying body: callers that spawned it leave it running
/// detached, signalled through `cancel`.
pub async fn enforce_timeout<F>(
    task: &str,
    timeout: Duration,
    cancel: CancelSignal,
    work: F,
) -> Result<Value, WorkflowError>
where
    F: Future<Output = Result<Value, WorkflowError>>,
{
    match tokio::time::timeout(timeout, work).await {
        Ok(res) => res,
        Err(_) => {
            cancel.cancel();
            warn!(
                task,
                timeout_secs = timeout.as_secs_f64(),
                "task exceeded its time budget; leaving it detached"
            );
            Err(WorkflowError::FunctionTimeout {
                task: task.to_string(),
                timeout,
            })
        }
    }
}
