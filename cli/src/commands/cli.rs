use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "taskflow", version, about = "Run checkpointed DAG workflows")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file to use instead of ~/.taskflow/config.toml or ./taskflow.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the demo pipeline, resuming from its checkpoint when one exists.
    Run(RunArgs),
    /// Print the execution levels of the demo pipeline.
    Plan,
    /// Show the stored status for a parameter set.
    Status(CheckpointArgs),
    /// Delete the checkpoint for a parameter set.
    Clear(CheckpointArgs),
    /// List stored checkpoints, newest first.
    List(StoreArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct StoreArgs {
    /// Checkpoint directory (overrides config).
    #[arg(long)]
    pub checkpoint_dir: Option<PathBuf>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct CheckpointArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Workflow parameter (KEY=VALUE). VALUE is parsed as JSON, falling back
    /// to a plain string. Can be specified multiple times.
    #[arg(long = "param", short = 'p', action = clap::ArgAction::Append)]
    pub params: Vec<String>,

    /// Address the checkpoint by key instead of by parameters.
    #[arg(long, conflicts_with = "params")]
    pub key: Option<String>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Workflow parameter (KEY=VALUE). Can be specified multiple times.
    #[arg(long = "param", short = 'p', action = clap::ArgAction::Append)]
    pub params: Vec<String>,

    /// Upper bound on concurrently running tasks (overrides config).
    #[arg(long)]
    pub max_workers: Option<usize>,

    /// Run without reading or writing checkpoints.
    #[arg(long, default_value_t = false)]
    pub no_checkpoint: bool,

    /// Duration of one simulated work unit, in milliseconds.
    #[arg(long, default_value_t = 100)]
    pub unit_ms: u64,

    /// Make the named task fail (exercises resume).
    #[arg(long)]
    pub fail: Option<String>,

    /// Disable progress bars.
    #[arg(long, default_value_t = false)]
    pub no_progress: bool,
}
