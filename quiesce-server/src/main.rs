//! # Quiesce
//!
//! Watches an incoming DICOM tree laid out as
//! `<tenant>/<study>/<series>/<file>` and posts a notification once a study
//! has received no new or modified files for the configured quiet period.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args as ClapArgs, Parser, Subcommand};
use quiesce_config::{ConfigLoad, ConfigLoader, ConfigWarnings};
use quiesce_core::StudyWatcher;
use quiesce_server::HttpNotifier;
use quiesce_server::infra::shutdown::shutdown_signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "quiesce")]
#[command(about = "Polls a DICOM study tree and reports studies that have stopped changing")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    load: LoadArgs,
}

#[derive(ClapArgs, Debug, Clone)]
struct LoadArgs {
    /// Path to the TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to a .env file loaded before reading QUIESCE_* variables
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Resolve and validate configuration, print it and exit
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Config(ConfigCommand::Check)) => run_config_check(&cli.load),
        None => run_watcher(&cli.load).await,
    }
}

fn load_config(args: &LoadArgs) -> anyhow::Result<ConfigLoad> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config {
        loader = loader.with_config_path(path);
    }
    if let Some(path) = &args.env_file {
        loader = loader.with_env_file(path);
    }
    loader.load().context("failed to load configuration")
}

fn run_config_check(args: &LoadArgs) -> anyhow::Result<()> {
    let ConfigLoad { config, warnings } = load_config(args)?;

    let rendered = serde_json::to_string_pretty(&config.watcher)
        .context("failed to render settings")?;
    println!("{rendered}");
    println!("notify_timeout: {}s", config.notify_timeout.as_secs());
    if let Some(path) = &config.metadata.config_path {
        println!("config file: {}", path.display());
    }

    for warning in &warnings.items {
        match &warning.hint {
            Some(hint) => println!("warning: {} ({hint})", warning.message),
            None => println!("warning: {}", warning.message),
        }
    }
    Ok(())
}

async fn run_watcher(args: &LoadArgs) -> anyhow::Result<()> {
    let ConfigLoad { config, warnings } = load_config(args)?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                // Per-scan summaries stay visible; override via RUST_LOG.
                "info,quiesce::scan=info,reqwest=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    if let Some(path) = &config.metadata.config_path {
        info!(path = %path.display(), "loaded configuration file");
    }
    log_warnings(&warnings);

    let notifier = HttpNotifier::new(config.watcher.api_url.clone(), config.notify_timeout)
        .context("failed to create ready notifier")?;
    info!(
        endpoint = %notifier.endpoint(),
        model = %config.watcher.model,
        workers = config.watcher.workers,
        batch_size = config.watcher.batch_size,
        "ready notifications enabled"
    );

    let watcher = Arc::new(StudyWatcher::new(config.watcher, Arc::new(notifier)));
    let handle = Arc::clone(&watcher).start();

    shutdown_signal().await;
    handle.stop().await;

    let snapshot = watcher.tracker().snapshot().await;
    info!(
        open_studies = snapshot.hierarchy.open_studies,
        ready_studies = snapshot.hierarchy.ready_studies,
        pending_deadlines = snapshot.pending_deadlines,
        "quiesce stopped"
    );
    Ok(())
}

fn log_warnings(warnings: &ConfigWarnings) {
    for warning in &warnings.items {
        match &warning.hint {
            Some(hint) => {
                warn!(message = %warning.message, hint = %hint, "configuration warning")
            }
            None => warn!(message = %warning.message, "configuration warning"),
        }
    }
}
