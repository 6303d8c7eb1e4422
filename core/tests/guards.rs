mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use taskflow_core::error::ResourceKind;
use taskflow_core::executor::ExecutionEngine;
use taskflow_core::guard::{ResourceProbe, ResourceSample};
use taskflow_core::{Params, TaskContext, TaskSpec, WorkflowBuilder, WorkflowError};

struct FixedProbe(ResourceSample);

impl ResourceProbe for FixedProbe {
    fn sample(&self) -> Option<ResourceSample> {
        Some(self.0)
    }
}

fn probe(memory_mb: f64, cpu_percent: f64) -> Arc<dyn ResourceProbe> {
    Arc::new(FixedProbe(ResourceSample {
        memory_mb,
        cpu_percent,
    }))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn timeout_names_the_task_and_its_budget() {
    let graph = WorkflowBuilder::new()
        .task(common::sleeping("slow_report", Duration::from_secs(3)).timeout(Duration::from_millis(100)))
        .build()
        .unwrap();
    let engine = ExecutionEngine::builder(graph).build().unwrap();

    let started = Instant::now();
    let err = engine.run(Params::new()).await.unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(1), "the caller must stop waiting");

    match &err {
        WorkflowError::FunctionTimeout { task, timeout } => {
            assert_eq!(task, "slow_report");
            assert_eq!(*timeout, Duration::from_millis(100));
        }
        other => panic!("expected FunctionTimeout, got {other:?}"),
    }
    assert_eq!(err.to_string(), "task 'slow_report' exceeded timeout of 0.1s");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn timed_out_body_observes_cancellation() {
    let observed = Arc::new(AtomicBool::new(false));
    let flag = observed.clone();

    let graph = WorkflowBuilder::new()
        .task(
            TaskSpec::new("cooperative", move |ctx: TaskContext| {
                let flag = flag.clone();
                async move {
                    ctx.cancelled().await;
                    flag.store(true, Ordering::SeqCst);
                    Ok(Value::Null)
                }
            })
            .timeout(Duration::from_millis(50)),
        )
        .build()
        .unwrap();
    let engine = ExecutionEngine::builder(graph).build().unwrap();

    let err = engine.run(Params::new()).await.unwrap_err();
    assert!(matches!(err, WorkflowError::FunctionTimeout { .. }));

    let deadline = Instant::now() + Duration::from_secs(1);
    while !observed.load(Ordering::SeqCst) && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(observed.load(Ordering::SeqCst), "detached body should see the cancel signal");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fast_task_within_timeout_succeeds() {
    let graph = WorkflowBuilder::new()
        .task(common::sleeping("quick", Duration::from_millis(10)).timeout(Duration::from_secs(2)))
        .build()
        .unwrap();
    let engine = ExecutionEngine::builder(graph).build().unwrap();

    let result = engine.run(Params::new()).await.unwrap();
    assert_eq!(result.get("quick"), Some(&json!("quick")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn memory_limit_violation_reaches_the_caller() {
    let graph = WorkflowBuilder::new()
        .task(common::sleeping("hog", Duration::from_secs(3)).memory_limit_mb(64.0))
        .build()
        .unwrap();
    let engine = ExecutionEngine::builder(graph)
        .resource_probe(probe(512.0, 1.0))
        .sample_interval(Duration::from_millis(10))
        .build()
        .unwrap();

    let started = Instant::now();
    let err = engine.run(Params::new()).await.unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(1));

    match err {
        WorkflowError::ResourceExhausted {
            task,
            resource,
            limit,
            observed,
        } => {
            assert_eq!(task, "hog");
            assert_eq!(resource, ResourceKind::Memory);
            assert_eq!(limit, 64.0);
            assert_eq!(observed, 512.0);
        }
        other => panic!("expected ResourceExhausted, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cpu_limit_violation_reaches_the_caller() {
    let graph = WorkflowBuilder::new()
        .task(common::sleeping("spinner", Duration::from_secs(3)).cpu_limit_percent(50.0))
        .build()
        .unwrap();
    let engine = ExecutionEngine::builder(graph)
        .resource_probe(probe(10.0, 95.0))
        .sample_interval(Duration::from_millis(10))
        .build()
        .unwrap();

    let err = engine.run(Params::new()).await.unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::ResourceExhausted {
            resource: ResourceKind::Cpu,
            ..
        }
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn timeout_wraps_resource_guard() {
    // Limits are respected, so only the outer timeout can fire.
    let graph = WorkflowBuilder::new()
        .task(
            common::sleeping("bounded", Duration::from_secs(3))
                .memory_limit_mb(1024.0)
                .timeout(Duration::from_millis(80)),
        )
        .build()
        .unwrap();
    let engine = ExecutionEngine::builder(graph)
        .resource_probe(probe(8.0, 1.0))
        .sample_interval(Duration::from_millis(10))
        .build()
        .unwrap();

    let err = engine.run(Params::new()).await.unwrap_err();
    assert!(matches!(err, WorkflowError::FunctionTimeout { .. }));
}
