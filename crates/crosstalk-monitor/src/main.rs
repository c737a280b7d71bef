//! crosstalk - live monitor for concurrent coding agents sharing a codebase.

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use crosstalk_core::Coordinator;
use crosstalk_monitor::{config, logging, output};
use std::path::PathBuf;
use std::sync::Arc;

use config::Config;
use logging::{LogConfig, LogFormat};
use output::Printer;

/// Watch agent transcripts and report files several agents touch at once.
#[derive(Parser, Debug)]
#[command(name = "crosstalk")]
#[command(about = "Live conflict monitor for coding-agent transcripts")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the projects directory to watch
    #[arg(long, value_name = "DIR")]
    projects_dir: Option<PathBuf>,

    /// Override the conflict window, in seconds
    #[arg(short, long, value_name = "SECS")]
    window: Option<f64>,

    /// Print events as JSON lines
    #[arg(long)]
    json: bool,

    /// Also print user message events
    #[arg(long)]
    messages: bool,

    /// Print discovered agents and exit
    #[arg(long)]
    snapshot: bool,

    /// Enable verbose logging (INFO level for most targets)
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable trace logging, including every dispatched event
    #[arg(long)]
    trace: bool,

    /// Quiet mode (WARN and ERROR only)
    #[arg(short, long)]
    quiet: bool,

    /// Set log level for specific targets (e.g., "tailer=debug").
    /// Can be specified multiple times. Targets are prefixed with "crosstalk::" automatically.
    #[arg(long = "log", value_name = "TARGET=LEVEL")]
    log_overrides: Vec<String>,

    /// Log output format (logs go to stderr)
    #[arg(long = "log-format", value_name = "FORMAT", default_value = "text")]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = LogConfig::from_cli(
        cli.verbose,
        cli.debug,
        cli.trace,
        cli.quiet,
        cli.log_overrides,
        cli.log_format,
    );
    logging::init(&log_config);

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    if let Some(dir) = cli.projects_dir {
        config.engine.projects_dir = dir;
    }
    if let Some(window) = cli.window {
        config.engine.conflict_window_secs = window;
    }
    config.output.json |= cli.json;
    config.output.show_messages |= cli.messages;

    let mut coordinator = Coordinator::new(config.engine.clone())?;
    tracing::info!(
        target: "crosstalk::startup",
        "Loaded configuration (projects: {:?}, window: {}s)",
        coordinator.config().projects_dir,
        coordinator.config().conflict_window_secs
    );

    let printer = Arc::new(Printer::new(&config.output));

    let activity_printer = printer.clone();
    coordinator.subscribe_activity(move |event| Ok(activity_printer.print_activity(event)?));
    let conflict_printer = printer.clone();
    coordinator.subscribe_conflicts(move |conflict| Ok(conflict_printer.print_conflict(conflict)?));

    if !coordinator.watch_default()? {
        tracing::warn!(
            target: "crosstalk::startup",
            "Nothing to watch; start an agent session or pass --projects-dir"
        );
    }

    let discovered = coordinator.rescan();
    tracing::info!(target: "crosstalk::startup", "Found {} recently active sessions", discovered);

    if cli.snapshot {
        printer.print_status(&coordinator.snapshot(), Utc::now())?;
        coordinator.stop();
        return Ok(());
    }

    coordinator
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(target: "crosstalk::startup", "Failed to listen for ctrl-c: {}", e);
            }
        })
        .await;

    printer.print_status(&coordinator.snapshot(), Utc::now())?;
    Ok(())
}
