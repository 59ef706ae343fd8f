#![deny(missing_docs)]
//! Shared logging utilities for the stagewatch workspace.
//!
//! This crate provides the `watch_*` logging macros used by the engine and the
//! app, the logger setup for the `stagewatch` binary, and a quiet initializer
//! for tests.

use std::fs::File;
use std::path::PathBuf;

use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

/// File written by [`LogDestination::File`] and [`LogDestination::Both`].
pub const LOG_FILE: &str = "./stagewatch.log";

/// Logs a trace-level message under the `stagewatch` target.
#[macro_export]
macro_rules! watch_trace {
    ($($arg:tt)*) => {{
        log::trace!(target: "stagewatch", $($arg)*);
    }};
}

/// Logs a debug-level message under the `stagewatch` target.
#[macro_export]
macro_rules! watch_debug {
    ($($arg:tt)*) => {{
        log::debug!(target: "stagewatch", $($arg)*);
    }};
}

/// Logs an info-level message under the `stagewatch` target.
#[macro_export]
macro_rules! watch_info {
    ($($arg:tt)*) => {{
        log::info!(target: "stagewatch", $($arg)*);
    }};
}

/// Logs a warn-level message under the `stagewatch` target.
#[macro_export]
macro_rules! watch_warn {
    ($($arg:tt)*) => {{
        log::warn!(target: "stagewatch", $($arg)*);
    }};
}

/// Logs an error-level message under the `stagewatch` target.
#[macro_export]
macro_rules! watch_error {
    ($($arg:tt)*) => {{
        log::error!(target: "stagewatch", $($arg)*);
    }};
}

/// Where log records go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogDestination {
    /// Write to [`LOG_FILE`].
    File,
    /// Write to the terminal (stderr for warnings and errors).
    #[default]
    Terminal,
    /// Write to both the file and the terminal.
    Both,
}

/// Installs the global logger. Silently keeps an already installed logger.
///
/// If the log file cannot be created, file output is skipped with a warning
/// on stderr and terminal output (if requested) still works.
pub fn initialize(destination: LogDestination, level: LevelFilter) {
    let config = build_config();

    let loggers: Vec<Box<dyn SharedLogger>> = match destination {
        LogDestination::File => match create_file_logger(level, config) {
            Some(file_logger) => vec![file_logger],
            None => return,
        },
        LogDestination::Terminal => vec![terminal_logger(level, config)],
        LogDestination::Both => {
            let mut loggers = vec![terminal_logger(level, config.clone())];
            if let Some(file_logger) = create_file_logger(level, config) {
                loggers.push(file_logger);
            }
            loggers
        }
    };

    let _ = CombinedLogger::init(loggers);
}

/// Initializes a simple terminal logger for use in tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    let level = if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}

fn build_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .build()
}

fn terminal_logger(level: LevelFilter, config: Config) -> Box<dyn SharedLogger> {
    TermLogger::new(level, config, TerminalMode::Mixed, ColorChoice::Auto)
}

fn create_file_logger(level: LevelFilter, config: Config) -> Option<Box<dyn SharedLogger>> {
    let log_path = PathBuf::from(LOG_FILE);
    match File::create(&log_path) {
        Ok(file) => Some(WriteLogger::new(level, config, file)),
        Err(err) => {
            eprintln!("Warning: Could not create log file at {:?}: {}", log_path, err);
            None
        }
    }
}
