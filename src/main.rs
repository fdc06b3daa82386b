//! triggerd - commit log trigger dispatcher
//!
//! CLI entry point for running the dispatcher and inspecting the commit log.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use eyre::{Context, Result, eyre};
use tracing::{info, warn};

use triggerd::cli::{Cli, Command, OutputFormat};
use triggerd::commitlog::{CommitLogSource, JsonlCommitLog, StatusSink};
use triggerd::config::Config;
use triggerd::dispatcher::{DispatcherConfig, DispatcherService};
use triggerd::domain::{EntryId, LogEntry, LogEntryStatus};
use triggerd::settings::{ConfigSource, FileConfigSource, POOL_SIZE_ENV, StaticConfigSource};
use triggerd::trigger::TriggerRouter;

fn setup_logging(verbose: bool, to_stderr: bool) -> Result<()> {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

    if to_stderr {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .init();
    } else {
        // Create log directory
        let log_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("triggerd")
            .join("logs");

        fs::create_dir_all(&log_dir).context("Failed to create log directory")?;
        let log_file = fs::File::create(log_dir.join("triggerd.log")).context("Failed to create log file")?;

        tracing_subscriber::fmt()
            .with_writer(log_file)
            .with_ansi(false)
            .with_env_filter(filter)
            .init();
    }

    info!("Logging initialized (verbose: {})", verbose);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let to_stderr = matches!(cli.command, Command::Run { stderr: true });
    setup_logging(cli.verbose, to_stderr).context("Failed to setup logging")?;

    let (config, config_path) = Config::load_with_path(cli.config.as_ref()).context("Failed to load configuration")?;
    let config = config
        .with_pool_size_override(std::env::var(POOL_SIZE_ENV).ok().as_deref())
        .context(format!("Invalid {}", POOL_SIZE_ENV))?;
    config.validate().context("Invalid configuration")?;

    info!(
        commit_log = %config.commit_log.path.display(),
        config = ?config_path,
        "triggerd loaded config"
    );

    let commit_log = Arc::new(JsonlCommitLog::new(&config.commit_log.path));

    match cli.command {
        Command::Run { .. } => cmd_run(&config, config_path, commit_log).await,
        Command::Pending { format } => cmd_pending(&commit_log, format).await,
        Command::Append {
            keyspace,
            table,
            row_key,
            status,
        } => cmd_append(&commit_log, keyspace, table, row_key, status).await,
        Command::Status { id, status } => cmd_status(&commit_log, id, status).await,
        Command::Compact => cmd_compact(&commit_log).await,
    }
}

/// Run the dispatcher until interrupted
async fn cmd_run(config: &Config, config_path: Option<PathBuf>, commit_log: Arc<JsonlCommitLog>) -> Result<()> {
    // The dispatch flag follows the config file when there is one; the pool
    // size override is already folded into `config` for the static case
    let settings: Arc<dyn ConfigSource> = match config_path {
        Some(path) => Arc::new(FileConfigSource::new(path)),
        None => Arc::new(StaticConfigSource::new(
            config.dispatch.enabled,
            config.dispatch.pool_size,
        )),
    };

    let executor = Arc::new(TriggerRouter::from_config(
        &config.trigger,
        commit_log.clone() as Arc<dyn StatusSink>,
    ));

    let service = DispatcherService::start(
        DispatcherConfig::from(&config.dispatch),
        commit_log,
        settings,
        executor,
    )
    .await
    .context("Failed to start dispatcher")?;

    println!(
        "triggerd running with {} workers. Press Ctrl+C to stop.",
        service.pool_size()
    );

    wait_for_signal().await?;

    info!("Shutting down...");
    let stats = service.shutdown().await;
    println!(
        "Stopped: {} executed, {} failed, {} panicked",
        stats.executed, stats.failed, stats.panicked
    );
    Ok(())
}

/// Wait for SIGINT or SIGTERM
async fn wait_for_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => warn!("SIGINT received"),
            _ = sigterm.recv() => warn!("SIGTERM received"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        warn!("Ctrl+C received");
    }

    Ok(())
}

/// Print entries still waiting to be processed
async fn cmd_pending(commit_log: &JsonlCommitLog, format: OutputFormat) -> Result<()> {
    let entries = commit_log.get_pending().await.context("Failed to read commit log")?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        OutputFormat::Text => {
            if entries.is_empty() {
                println!("No pending entries");
                return Ok(());
            }

            println!("{:<10} {:<10} {:<30} {:<20} TIMESTAMP", "ID", "STATUS", "TABLE", "ROW");
            for entry in &entries {
                println!(
                    "{:<10} {:<10} {:<30} {:<20} {}",
                    entry.id.short(),
                    entry.status,
                    entry.qualified_table(),
                    entry.row_key,
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
    }

    Ok(())
}

/// Append a new entry
async fn cmd_append(
    commit_log: &JsonlCommitLog,
    keyspace: String,
    table: String,
    row_key: String,
    status: LogEntryStatus,
) -> Result<()> {
    let entry = LogEntry::new(keyspace, table, row_key).with_status(status);
    commit_log
        .append(&entry)
        .await
        .context(format!("Failed to append to {}", commit_log.path().display()))?;

    println!("{}", entry.id);
    Ok(())
}

/// Record a status transition for an existing entry
async fn cmd_status(commit_log: &JsonlCommitLog, id: String, status: LogEntryStatus) -> Result<()> {
    let id = EntryId::from(id);
    if commit_log.get(&id).await?.is_none() {
        return Err(eyre!("No entry with id {}", id));
    }

    commit_log
        .set_status(&id, status, None)
        .await
        .context(format!("Failed to update {}", id))?;

    println!("{} -> {}", id, status);
    Ok(())
}

/// Drop superseded records from the commit log
async fn cmd_compact(commit_log: &JsonlCommitLog) -> Result<()> {
    let dropped = commit_log
        .compact()
        .await
        .context(format!("Failed to compact {}", commit_log.path().display()))?;

    println!("Dropped {} superseded records", dropped);
    Ok(())
}
