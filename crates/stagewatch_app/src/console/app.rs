use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use chrono::Local;
use stagewatch_core::{ConnectionState, Failure, FailureKind, Notification, Outcome, StageMapper};
use stagewatch_engine::EngineHandle;
use watch_logging::{watch_info, watch_warn};

use super::config::WatcherConfig;
use super::render::render;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Where the consumer goes once a task ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Report { url: String },
    ErrorScreen { message: String },
}

/// A completion without a report id falls back to the report named after the task.
pub fn navigation_for(base_url: &str, task_id: &str, outcome: &Outcome) -> Navigation {
    match outcome {
        Outcome::Completed { report_id, .. } => {
            let report = report_id.as_deref().unwrap_or(task_id.trim());
            Navigation::Report {
                url: format!("{}/report/{}", base_url.trim_end_matches('/'), report),
            }
        }
        Outcome::Failed(failure) => Navigation::ErrorScreen {
            message: failure.to_string(),
        },
    }
}

/// Progress screen for one task: folds engine events and redraws on change.
struct ProgressScreen {
    task_id: String,
    mapper: StageMapper,
    connection: ConnectionState,
    connection_changed: bool,
}

impl ProgressScreen {
    fn new(task_id: &str) -> Self {
        Self {
            task_id: task_id.to_string(),
            mapper: StageMapper::new(),
            connection: ConnectionState::Idle,
            connection_changed: false,
        }
    }

    /// Returns the outcome once the subscription has finished.
    fn apply(&mut self, notification: Notification) -> Option<Outcome> {
        match notification {
            Notification::ConnectionChanged(state) => {
                if state != self.connection {
                    self.connection = state;
                    self.connection_changed = true;
                }
                None
            }
            Notification::Status(msg) => {
                self.mapper.apply(&msg);
                None
            }
            Notification::Finished(outcome) => Some(outcome),
        }
    }

    fn redraw_if_dirty(&mut self) {
        let dirty = self.mapper.consume_dirty();
        if dirty || std::mem::take(&mut self.connection_changed) {
            self.draw();
        }
    }

    fn draw(&self) {
        let stamp = Local::now().format("%H:%M:%S").to_string();
        for line in render(&self.task_id, &self.mapper.view(), self.connection, &stamp) {
            println!("{line}");
        }
    }
}

pub fn run(config: &WatcherConfig, task_id: &str) -> ExitCode {
    let engine = EngineHandle::new(config.stream_settings());
    let mut screen = ProgressScreen::new(task_id);
    watch_info!("watching task {} at {}", task_id, config.base_url);
    engine.subscribe(task_id);

    let outcome = follow(&engine, &mut screen);
    finish(config, task_id, &outcome)
}

/// Polls the engine until the task finishes or the engine goes away.
fn follow(engine: &EngineHandle, screen: &mut ProgressScreen) -> Outcome {
    loop {
        loop {
            match engine.try_recv() {
                Ok(Some(event)) => {
                    if let Some(outcome) = screen.apply(event.notification) {
                        screen.redraw_if_dirty();
                        return outcome;
                    }
                }
                Ok(None) => break,
                Err(stopped) => {
                    watch_warn!("{} before the task finished", stopped);
                    screen.redraw_if_dirty();
                    return Outcome::Failed(Failure::new(FailureKind::EngineStopped, ""));
                }
            }
        }
        screen.redraw_if_dirty();
        thread::sleep(POLL_INTERVAL);
    }
}

fn finish(config: &WatcherConfig, task_id: &str, outcome: &Outcome) -> ExitCode {
    match navigation_for(&config.base_url, task_id, outcome) {
        Navigation::Report { url } => {
            watch_info!("task finished, report at {}", url);
            println!("Report ready: {url}");
            ExitCode::SUCCESS
        }
        Navigation::ErrorScreen { message } => {
            watch_warn!("task {} failed: {}", task_id, message);
            eprintln!("Analysis failed: {message}");
            ExitCode::FAILURE
        }
    }
}
