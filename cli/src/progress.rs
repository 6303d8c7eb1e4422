use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use taskflow_core::executor::{ExecutionEvent, ExecutionObserver};
use taskflow_core::util::format_duration;

/// Terminal progress for a workflow run.
///
/// One overall bar counts finished tasks (cached ones included); each running
/// task gets a spinner until it completes or fails.
pub struct ProgressMonitor {
    multi: MultiProgress,
    overall: ProgressBar,
    task_bars: Mutex<HashMap<String, ProgressBar>>,
    enabled: bool,
}

impl ProgressMonitor {
    /// `enabled = false` yields a monitor that draws nothing.
    pub fn new(total_tasks: usize, enabled: bool) -> Self {
        if !enabled {
            return Self {
                multi: MultiProgress::new(),
                overall: ProgressBar::hidden(),
                task_bars: Mutex::new(HashMap::new()),
                enabled: false,
            };
        }

        let multi = MultiProgress::new();
        let overall = multi.add(ProgressBar::new(total_tasks as u64));
        overall.set_style(
            ProgressStyle::default_bar()
                .template(
                    "[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} tasks ({percent}%) {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓▒░  "),
        );
        overall.set_message("Starting...");

        Self {
            multi,
            overall,
            task_bars: Mutex::new(HashMap::new()),
            enabled: true,
        }
    }

    fn bars(&self) -> std::sync::MutexGuard<'_, HashMap<String, ProgressBar>> {
        self.task_bars
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn add_task(&self, task: &str) {
        if !self.enabled {
            return;
        }

        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("  {spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        bar.set_message(format!("⏳ {task}"));
        bar.enable_steady_tick(Duration::from_millis(100));

        self.bars().insert(task.to_string(), bar);
    }

    fn finish_task(&self, task: &str, outcome: String) {
        if !self.enabled {
            return;
        }
        if let Some(bar) = self.bars().remove(task) {
            bar.finish_with_message(outcome);
        }
        self.overall.inc(1);
    }

    fn finish(&self, success: bool) {
        if !self.enabled {
            return;
        }
        let msg = if success {
            "✅ All tasks completed"
        } else {
            "❌ Execution failed"
        };
        self.overall.finish_with_message(msg);
    }
}

impl ExecutionObserver for ProgressMonitor {
    fn name(&self) -> &str {
        "progress"
    }

    fn on_event(&self, event: &ExecutionEvent) {
        match event {
            ExecutionEvent::RunStart { restored, .. } if *restored > 0 => {
                if self.enabled {
                    self.overall
                        .set_message(format!("resuming, {restored} restored"));
                }
            }
            ExecutionEvent::LevelStart { level, .. } => {
                if self.enabled {
                    self.overall.set_message(format!("level {}", level + 1));
                }
            }
            ExecutionEvent::TaskCached { .. } => {
                if self.enabled {
                    self.overall.inc(1);
                }
            }
            ExecutionEvent::TaskStart { task, .. } => self.add_task(task),
            ExecutionEvent::TaskComplete { task, duration, .. } => {
                self.finish_task(task, format!("✅ {task} ({})", format_duration(*duration)));
            }
            ExecutionEvent::TaskFailed { task, .. } => {
                self.finish_task(task, format!("❌ {task}"));
            }
            ExecutionEvent::RunEnd { .. } => self.finish(true),
            ExecutionEvent::RunFailed { .. } => self.finish(false),
            _ => {}
        }
    }
}

impl Drop for ProgressMonitor {
    fn drop(&mut self) {
        for (_, bar) in self.bars().drain() {
            bar.finish_and_clear();
        }
    }
}
