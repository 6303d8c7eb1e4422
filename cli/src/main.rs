use clap::Parser;
mod commands;
mod demo;
mod progress;
use commands::cli;
use taskflow_core::config::{self, AppConfig, LoggingConfig};
use taskflow_core::WorkflowError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

static LOG_GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
    std::sync::OnceLock::new();

#[tokio::main]
async fn main() {
    let exit = tokio::select! {
        res = real_main() => match res {
            Ok(code) => code,
            Err(e) => {
                eprintln!("{e:#}");
                exit_code_for_error(&e)
            }
        },
        _ = tokio::signal::ctrl_c() => {
            eprintln!("interrupted; completed tasks remain checkpointed");
            130
        }
    };

    std::process::exit(exit);
}

async fn real_main() -> anyhow::Result<i32> {
    let args = cli::Args::parse();
    let cfg = match args.config.as_deref() {
        Some(path) => {
            let mut cfg = config::load_from_path(path).map_err(ConfigError)?;
            config::apply_env_overrides(&mut cfg, |key| std::env::var(key).ok())
                .map_err(ConfigError)?;
            cfg
        }
        None => config::load_default().map_err(ConfigError)?,
    };
    init_tracing(&cfg.logging).map_err(|e| ConfigError(anyhow::anyhow!(e)))?;

    dispatch(args.command, &cfg).await
}

/// Marks configuration failures so they map to their own exit code.
#[derive(Debug)]
struct ConfigError(anyhow::Error);

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "config error: {:#}", self.0)
    }
}

impl std::error::Error for ConfigError {}

const CONFIG_EXIT_CODE: i32 = 10;

fn exit_code_for_error(e: &anyhow::Error) -> i32 {
    // 0: success
    // 1: checkpoint not found (status)
    // 3-70: workflow errors, see ErrorCode
    // 10: config error
    // 50: internal/uncategorized
    if let Some(we) = e.downcast_ref::<WorkflowError>() {
        return we.error_code().as_u16() as i32;
    }
    if e.downcast_ref::<ConfigError>().is_some() {
        return CONFIG_EXIT_CODE;
    }
    50
}

async fn dispatch(cmd: cli::Commands, cfg: &AppConfig) -> anyhow::Result<i32> {
    match cmd {
        cli::Commands::Run(run_args) => commands::run::run(run_args, cfg).await,
        cli::Commands::Plan => {
            let graph = demo::build(&demo::DemoOptions::default())?;
            let plan = graph.execution_plan()?;
            for (i, level) in plan.levels().iter().enumerate() {
                let tasks: Vec<&str> = level.iter().map(String::as_str).collect();
                println!("level {}: {}", i + 1, tasks.join(", "));
            }
            Ok(0)
        }
        cli::Commands::Status(args) => commands::checkpoint::status(args, cfg),
        cli::Commands::Clear(args) => commands::checkpoint::clear(args, cfg),
        cli::Commands::List(args) => commands::checkpoint::list(args, cfg),
    }
}

fn init_tracing(logging: &LoggingConfig) -> Result<(), String> {
    if !logging.enabled {
        return Ok(());
    }

    let filter = match std::env::var("RUST_LOG") {
        Ok(v) if !v.trim().is_empty() => EnvFilter::from_default_env(),
        _ => EnvFilter::try_new(logging.level.clone()).map_err(|e| e.to_string())?,
    };

    let mut maybe_writer = None;

    if logging.file {
        let dir = match logging
            .directory
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            Some(d) => std::path::PathBuf::from(d),
            None => std::env::temp_dir().join("taskflow"),
        };

        std::fs::create_dir_all(&dir).map_err(|e| format!("create log dir failed: {e}"))?;
        let file_name = format!("taskflow.{}.log", std::process::id());
        let appender = tracing_appender::rolling::never(dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        let _ = LOG_GUARD.set(guard);
        maybe_writer = Some(non_blocking);
    }

    if !logging.console && maybe_writer.is_none() {
        return Err("logging disabled for both console and file".to_string());
    }

    let console_layer = logging.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(atty::is(atty::Stream::Stderr))
    });

    let file_layer = maybe_writer.map(|w| {
        tracing_subscriber::fmt::layer()
            .with_writer(w)
            .with_ansi(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(())
}
