mod console;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::LevelFilter;

use console::config::{LogChoice, WatcherConfig};

/// Follow one analysis task until it finishes.
#[derive(Debug, Parser)]
#[command(name = "stagewatch", version)]
struct Cli {
    /// Task id returned by the task creation endpoint.
    task_id: String,

    /// RON file with connection and retry settings.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides `base_url` from the config file.
    #[arg(long)]
    base_url: Option<String>,

    /// Overrides `log_destination` from the config file.
    #[arg(long, value_enum)]
    log: Option<LogChoice>,

    /// Log at debug level.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match WatcherConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("stagewatch: {err:#}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }
    if let Some(log) = cli.log {
        config.log_destination = log;
    }

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    watch_logging::initialize(config.log_destination.into(), level);

    console::app::run(&config, &cli.task_id)
}
