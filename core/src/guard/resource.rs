use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use sysinfo::{Pid, System};
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use super::CancelSignal;
use crate::error::{ResourceKind, WorkflowError};

/// Memory and CPU budgets for a task. `None` leaves a resource unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResourceLimits {
    pub memory_limit_mb: Option<f64>,
    pub cpu_limit_percent: Option<f64>,
}

impl ResourceLimits {
    pub fn is_unbounded(&self) -> bool {
        self.memory_limit_mb.is_none() && self.cpu_limit_percent.is_none()
    }

    /// First limit exceeded by `sample`, memory checked before CPU.
    pub fn check(&self, sample: &ResourceSample) -> Option<Violation> {
        if let Some(limit) = self.memory_limit_mb {
            if sample.memory_mb > limit {
                return Some(Violation {
                    resource: ResourceKind::Memory,
                    limit,
                    observed: sample.memory_mb,
                });
            }
        }
        if let Some(limit) = self.cpu_limit_percent {
            if sample.cpu_percent > limit {
                return Some(Violation {
                    resource: ResourceKind::Cpu,
                    limit,
                    observed: sample.cpu_percent,
                });
            }
        }
        None
    }
}

/// One reading of the process's resource usage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceSample {
    pub memory_mb: f64,
    pub cpu_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Violation {
    pub resource: ResourceKind,
    pub limit: f64,
    pub observed: f64,
}

/// Source of resource samples for the guard.
pub trait ResourceProbe: Send + Sync {
    /// `None` when the process could not be sampled this round.
    fn sample(&self) -> Option<ResourceSample>;
}

/// Samples the current process through `sysinfo`.
///
/// CPU usage is relative to the previous refresh, so the first sample after
/// construction reads 0%.
pub struct SysinfoProbe {
    pid: Option<Pid>,
    system: Mutex<System>,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        let pid = sysinfo::get_current_pid().ok();
        let mut system = System::new();
        if let Some(pid) = pid {
            system.refresh_process(pid);
        }
        Self {
            pid,
            system: Mutex::new(system),
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceProbe for SysinfoProbe {
    fn sample(&self) -> Option<ResourceSample> {
        let pid = self.pid?;
        let mut system = match self.system.lock() {
            Ok(system) => system,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !system.refresh_process(pid) {
            return None;
        }
        let process = system.process(pid)?;
        Some(ResourceSample {
            memory_mb: process.memory() as f64 / (1024.0 * 1024.0),
            cpu_percent: process.cpu_usage() as f64,
        })
    }
}

/// Drive `work` while sampling `probe` every `interval`.
///
/// A limit violation is delivered here, to the caller awaiting the task, as
/// `ResourceExhausted`; the sampler never fails on its own.
pub async fn enforce_limits<F>(
    task: &str,
    limits: ResourceLimits,
    probe: Arc<dyn ResourceProbe>,
    interval: Duration,
    cancel: CancelSignal,
    work: F,
) -> Result<Value, WorkflowError>
where
    F: Future<Output = Result<Value, WorkflowError>>,
{
    if limits.is_unbounded() {
        return work.await;
    }

    let watchdog = watch_limits(task, limits, probe, interval);
    tokio::pin!(work);
    tokio::pin!(watchdog);

    tokio::select! {
        biased;
        res = &mut work => res,
        violation = &mut watchdog => {
            cancel.cancel();
            warn!(
                task,
                resource = %violation.resource,
                limit = violation.limit,
                observed = violation.observed,
                "resource limit exceeded; abandoning task"
            );
            Err(WorkflowError::ResourceExhausted {
                task: task.to_string(),
                resource: violation.resource,
                limit: violation.limit,
                observed: violation.observed,
            })
        }
    }
}

async fn watch_limits(
    task: &str,
    limits: ResourceLimits,
    probe: Arc<dyn ResourceProbe>,
    interval: Duration,
) -> Violation {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let Some(sample) = probe.sample() else {
            continue;
        };
        debug!(
            task,
            memory_mb = sample.memory_mb,
            cpu_percent = sample.cpu_percent,
            "resource sample"
        );
        if let Some(violation) = limits.check(&sample) {
            return violation;
        }
    }
}
