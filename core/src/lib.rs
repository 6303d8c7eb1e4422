//! Checkpointed DAG workflow engine.
//!
//! Tasks are registered with a [`WorkflowBuilder`], grouped into execution
//! levels and run level by level by an [`ExecutionEngine`]. Independent tasks
//! in a level run concurrently on a bounded pool; every success is written to
//! a [`checkpoint`] keyed by the run parameters so a failed run can be resumed
//! by calling `run` again with the same parameters.

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod executor;
pub mod guard;
pub mod params;
pub mod util;

pub use checkpoint::{CheckpointKey, CheckpointStore, FileCheckpointStore};
pub use config::AppConfig;
pub use error::{ErrorCode, WorkflowError};
pub use executor::{
    ExecutionEngine, ExecutionEvent, ExecutionObserver, ExecutionResult, TaskContext, TaskSpec,
    WorkflowBuilder,
};
pub use params::{ParamSchema, ParamSpec, ParamType, Params};
