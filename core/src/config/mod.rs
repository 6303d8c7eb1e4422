mod load;
mod types;

pub use load::{
    apply_env_overrides, get_taskflow_data_dir, load_default, load_from_path, ENV_CHECKPOINT_DIR,
    ENV_LOG_LEVEL, ENV_MAX_WORKERS,
};
pub use types::{AppConfig, CheckpointConfig, ExecutorConfig, LoggingConfig};
