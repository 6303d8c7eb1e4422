use std::sync::Arc;
use std::time::Duration;

use taskflow_core::executor::{ExecutionEngine, ExecutionOpts};
use taskflow_core::util::format_duration;
use taskflow_core::{AppConfig, ExecutionResult, FileCheckpointStore};

use super::cli::RunArgs;
use crate::demo::{self, DemoOptions};
use crate::progress::ProgressMonitor;

pub async fn run(args: RunArgs, cfg: &AppConfig) -> anyhow::Result<i32> {
    let params = super::parse_params(&args.params)?;
    let graph = demo::build(&DemoOptions {
        unit: Duration::from_millis(args.unit_ms),
        fail: args.fail.clone(),
    })?;

    let mut opts = ExecutionOpts::from_config(&cfg.executor);
    if let Some(workers) = args.max_workers {
        if workers == 0 {
            anyhow::bail!("--max-workers must be at least 1");
        }
        opts.max_workers = workers;
    }

    let show_progress = !args.no_progress && atty::is(atty::Stream::Stderr);
    let monitor = Arc::new(ProgressMonitor::new(graph.len(), show_progress));

    let mut builder = ExecutionEngine::builder(graph)
        .opts(opts)
        .observer(monitor);

    if cfg.checkpoint.enabled && !args.no_checkpoint {
        let dir = super::checkpoint_dir(args.store.checkpoint_dir.as_ref(), cfg);
        let store = FileCheckpointStore::new(dir)?;
        tracing::debug!(dir = %store.dir().display(), "using checkpoint store");
        builder = builder.checkpoint_store(Arc::new(store));
    }

    let engine = builder.build()?;
    match engine.run(params).await {
        Ok(result) => {
            print_summary(&result);
            Ok(0)
        }
        Err(err) => {
            if let Some(task) = err.task() {
                eprintln!("workflow failed at task '{task}'");
            }
            let resumable = !err.is_validation() && engine.checkpoint_store().is_some();
            if resumable {
                eprintln!(
                    "completed tasks were checkpointed; rerun with the same parameters to resume"
                );
            }
            Err(err.into())
        }
    }
}

fn print_summary(result: &ExecutionResult) {
    println!("run {} (checkpoint {})", result.run_id, result.checkpoint_key);
    for (i, level) in result.levels.iter().enumerate() {
        println!("level {}: {}", i + 1, level.join(", "));
    }
    println!();

    let width = result.results.keys().map(String::len).max().unwrap_or(0);
    for (task, value) in &result.results {
        let timing = match result.timings.get(task) {
            Some(d) => format_duration(*d),
            None if result.was_cached(task) => "cached".to_string(),
            None => "-".to_string(),
        };
        println!("{task:<width$}  {timing:>10}  {value}");
    }

    println!();
    println!(
        "{} executed, {} cached, total {}",
        result.executed.len(),
        result.cached.len(),
        format_duration(result.duration)
    );
}
