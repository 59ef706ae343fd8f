use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use stagewatch_core::{ResetPolicy, RetryPolicy};
use stagewatch_engine::StreamSettings;
use watch_logging::LogDestination;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogChoice {
    #[default]
    Terminal,
    File,
    Both,
}

impl From<LogChoice> for LogDestination {
    fn from(choice: LogChoice) -> Self {
        match choice {
            LogChoice::Terminal => LogDestination::Terminal,
            LogChoice::File => LogDestination::File,
            LogChoice::Both => LogDestination::Both,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub base_delay_ms: u64,
    pub cap_delay_ms: u64,
    pub max_attempts: u32,
    pub reset_on_open: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            base_delay_ms: policy.base_delay.as_millis() as u64,
            cap_delay_ms: policy.cap_delay.as_millis() as u64,
            max_attempts: policy.max_attempts,
            reset_on_open: policy.reset == ResetPolicy::OnOpen,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_millis(self.base_delay_ms),
            cap_delay: Duration::from_millis(self.cap_delay_ms),
            max_attempts: self.max_attempts,
            reset: if self.reset_on_open {
                ResetPolicy::OnOpen
            } else {
                ResetPolicy::Never
            },
        }
    }
}

/// Settings read from the optional RON file; every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    pub base_url: String,
    pub endpoint_path: String,
    pub connect_timeout_ms: u64,
    pub retry: RetryConfig,
    pub log_destination: LogChoice,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        let stream = StreamSettings::default();
        Self {
            base_url: stream.base_url,
            endpoint_path: stream.endpoint_path,
            connect_timeout_ms: stream.connect_timeout.as_millis() as u64,
            retry: RetryConfig::default(),
            log_destination: LogChoice::default(),
        }
    }
}

impl WatcherConfig {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        Ok(ron::from_str(text)?)
    }

    pub fn stream_settings(&self) -> StreamSettings {
        StreamSettings {
            base_url: self.base_url.clone(),
            endpoint_path: self.endpoint_path.clone(),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            retry: self.retry.policy(),
        }
    }
}
