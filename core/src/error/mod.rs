pub mod checkpoint;
pub mod params;
pub mod workflow;

pub use checkpoint::CheckpointError;
pub use params::ParameterError;
pub use workflow::{ErrorCode, ResourceKind, WorkflowError};

pub type Result<T, E = WorkflowError> = std::result::Result<T, E>;
