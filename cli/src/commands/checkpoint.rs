use taskflow_core::checkpoint::StatusRecord;
use taskflow_core::{AppConfig, CheckpointKey, CheckpointStore, FileCheckpointStore};

use super::cli::{CheckpointArgs, StoreArgs};

fn open_store(args: &StoreArgs, cfg: &AppConfig) -> anyhow::Result<FileCheckpointStore> {
    let dir = super::checkpoint_dir(args.checkpoint_dir.as_ref(), cfg);
    Ok(FileCheckpointStore::new(dir)?)
}

fn resolve_key(args: &CheckpointArgs) -> anyhow::Result<CheckpointKey> {
    match &args.key {
        Some(hex) => CheckpointKey::parse(hex)
            .ok_or_else(|| anyhow::anyhow!("invalid checkpoint key '{hex}'")),
        None => Ok(CheckpointKey::for_params(&super::parse_params(&args.params)?)),
    }
}

pub fn status(args: CheckpointArgs, cfg: &AppConfig) -> anyhow::Result<i32> {
    let store = open_store(&args.store, cfg)?;
    let key = resolve_key(&args)?;

    match store.status(&key)? {
        Some(record) => {
            print!("{}", describe(&key, &record));
            Ok(0)
        }
        None => {
            println!("no checkpoint for {key}");
            Ok(1)
        }
    }
}

pub fn clear(args: CheckpointArgs, cfg: &AppConfig) -> anyhow::Result<i32> {
    let store = open_store(&args.store, cfg)?;
    let key = resolve_key(&args)?;

    if store.clear(&key)? {
        tracing::info!(checkpoint.key = %key, "checkpoint cleared");
        println!("cleared checkpoint {key}");
    } else {
        println!("no checkpoint for {key}");
    }
    Ok(0)
}

pub fn list(args: StoreArgs, cfg: &AppConfig) -> anyhow::Result<i32> {
    let store = open_store(&args, cfg)?;
    let keys = store.list()?;
    if keys.is_empty() {
        println!("no checkpoints in {}", store.dir().display());
        return Ok(0);
    }

    for key in keys {
        match store.status(&key) {
            Ok(Some(record)) => println!(
                "{key}  {:<9}  {} tasks  {}",
                format!("{:?}", record.status).to_lowercase(),
                record.completed_tasks.len(),
                record.last_updated.format("%Y-%m-%d %H:%M:%S")
            ),
            Ok(None) => println!("{key}  (no status)"),
            Err(e) => {
                tracing::warn!(checkpoint.key = %key, error = %e, "unreadable status sidecar");
                println!("{key}  (unreadable status)");
            }
        }
    }
    Ok(0)
}

fn describe(key: &CheckpointKey, record: &StatusRecord) -> String {
    let params = serde_json::to_string(&record.parameters).unwrap_or_default();
    format!(
        "checkpoint: {key}\nrun:        {}\nstatus:     {:?}\nupdated:    {}\nparameters: {params}\ncompleted:  {}\n",
        record.run_id,
        record.status,
        record.last_updated.to_rfc3339(),
        record.completed_tasks.join(", "),
    )
}
