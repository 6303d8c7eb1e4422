use std::path::{Path, PathBuf};

use super::types::AppConfig;

pub const ENV_MAX_WORKERS: &str = "TASKFLOW_MAX_WORKERS";
pub const ENV_CHECKPOINT_DIR: &str = "TASKFLOW_CHECKPOINT_DIR";
pub const ENV_LOG_LEVEL: &str = "TASKFLOW_LOG_LEVEL";

/// Get the default taskflow data directory: ~/.taskflow
pub fn get_taskflow_data_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(PathBuf::from(home).join(".taskflow"))
}

pub fn load_default() -> anyhow::Result<AppConfig> {
    // Priority 1: ~/.taskflow/config.toml
    let user_config = get_taskflow_data_dir()
        .map(|dir| dir.join("config.toml"))
        .ok();

    // Priority 2: ./taskflow.toml
    let local_config = Path::new("taskflow.toml");

    let mut cfg = match user_config.filter(|p| p.exists()) {
        Some(path) => load_from_path(&path)?,
        None if local_config.exists() => load_from_path(local_config)?,
        None => AppConfig::default(),
    };

    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok())?;
    Ok(cfg)
}

pub fn load_from_path(path: &Path) -> anyhow::Result<AppConfig> {
    let s = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config {}: {e}", path.display()))?;
    let cfg = toml::from_str::<AppConfig>(&s)
        .map_err(|e| anyhow::anyhow!("invalid config {}: {e}", path.display()))?;
    Ok(cfg)
}

/// Environment variable overrides (highest priority). Blank values are ignored.
pub fn apply_env_overrides<F>(cfg: &mut AppConfig, lookup: F) -> anyhow::Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get(ENV_MAX_WORKERS) {
        let workers: usize = v
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{ENV_MAX_WORKERS} must be a positive integer, got '{v}'"))?;
        if workers == 0 {
            anyhow::bail!("{ENV_MAX_WORKERS} must be at least 1");
        }
        cfg.executor.max_workers = workers;
    }
    if let Some(v) = get(ENV_CHECKPOINT_DIR) {
        cfg.checkpoint.directory = v;
    }
    if let Some(v) = get(ENV_LOG_LEVEL) {
        cfg.logging.level = v;
    }
    Ok(())
}
