//! Executor for task dependency graphs (DAG)
//!
//! It provides:
//! - Task graph construction with exhaustive missing-dependency reporting
//! - Cycle detection that reports the concrete cycle path
//! - Level computation (topological generations)
//! - Level-barrier execution with a bounded worker pool per level
//! - Result memoization through the checkpoint store
//!
//! # Architecture
//!
//! ```text
//! Vec<TaskSpec>
//!   ↓
//! WorkflowBuilder::build()
//!   ↓
//! TaskGraph { nodes (dependencies + dependents) }
//!   ↓
//! TaskGraph::validate() → missing_dependencies(), detect_cycle()
//!   ↓
//! compute_levels() → ExecutionPlan (Vec<BTreeSet<String>>)
//!   ↓
//! ExecutionEngine::run(params)
//!   → validate params → load checkpoint → per level:
//!       cached? skip : run (inline if alone, pooled otherwise)
//!       → resource guard → timeout guard → commit + save checkpoint
//!   ↓
//! ExecutionResult
//! ```

mod context;
mod engine;
mod graph;
mod observer;
mod plan;
mod scheduler;
pub mod types;

pub use context::TaskContext;
pub use engine::{ExecutionEngine, ExecutionEngineBuilder};
pub use graph::{TaskGraph, TaskNode, WorkflowBuilder};
pub use observer::{ExecutionEvent, ExecutionObserver};
pub use plan::{compute_levels, ExecutionPlan};
pub use scheduler::execute_level_parallel;
pub use types::{ExecutionOpts, ExecutionResult, TaskFn, TaskFuture, TaskSpec};
