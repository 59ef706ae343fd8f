use serde::Deserialize;
use thiserror::Error;

/// Server-reported state of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Searching,
    Scraping,
    Analyzing,
    Generating,
    Completed,
    Error,
    /// Handshake sent by the server on every fresh connection.
    Connected,
    /// The payload carried a task id but no status.
    Unspecified,
    /// Anything else the server emits, kept verbatim.
    Other(String),
}

impl TaskStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "searching" => Self::Searching,
            "scraping" => Self::Scraping,
            "analyzing" => Self::Analyzing,
            "generating" => Self::Generating,
            "completed" => Self::Completed,
            "error" => Self::Error,
            "connected" => Self::Connected,
            "" => Self::Unspecified,
            _ => Self::Other(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Searching => "searching",
            Self::Scraping => "scraping",
            Self::Analyzing => "analyzing",
            Self::Generating => "generating",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Connected => "connected",
            Self::Unspecified => "",
            Self::Other(raw) => raw,
        }
    }

    /// `completed` and `error` end the subscription.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

/// One parsed server event.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusMessage {
    pub task_id: Option<String>,
    pub status: TaskStatus,
    pub progress_current: Option<f64>,
    pub progress_total: Option<f64>,
    /// On `completed`, the id of the generated report.
    pub stage_hint: Option<String>,
    pub human_message: Option<String>,
    pub error_detail: Option<String>,
}

impl StatusMessage {
    /// Bare message with only a status, used by tests and synthetic updates.
    pub fn with_status(status: TaskStatus) -> Self {
        Self {
            task_id: None,
            status,
            progress_current: None,
            progress_total: None,
            stage_hint: None,
            human_message: None,
            error_detail: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// `progress_current` clamped to a displayable percentage.
    pub fn percent(&self) -> Option<u8> {
        self.progress_current
            .filter(|value| value.is_finite())
            .map(|value| value.clamp(0.0, 100.0).round() as u8)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseFailure {
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("payload is not a JSON object")]
    NotAnObject,
    #[error("payload has unexpected field types: {0}")]
    InvalidShape(String),
    #[error("payload carries neither `status` nor `task_id`")]
    MissingIdentity,
    #[error("payload belongs to task {found}, expected {expected}")]
    ForeignTask { expected: String, found: String },
}

#[derive(Debug, Deserialize)]
struct WireStatus {
    #[serde(default)]
    task_id: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    progress: Option<WireProgress>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireProgress {
    #[serde(default)]
    current: Option<f64>,
    #[serde(default)]
    total: Option<f64>,
    #[serde(default)]
    stage: Option<String>,
}

/// Decodes one event payload.
///
/// The payload must be a JSON object carrying at least `status` or `task_id`.
/// Unknown fields are ignored.
pub fn decode_status(payload: &str) -> Result<StatusMessage, ParseFailure> {
    let value: serde_json::Value = serde_json::from_str(payload)
        .map_err(|err| ParseFailure::InvalidJson(err.to_string()))?;
    if !value.is_object() {
        return Err(ParseFailure::NotAnObject);
    }
    let wire: WireStatus = serde_json::from_value(value)
        .map_err(|err| ParseFailure::InvalidShape(err.to_string()))?;

    let task_id = non_empty(wire.task_id);
    let status = non_empty(wire.status);
    if task_id.is_none() && status.is_none() {
        return Err(ParseFailure::MissingIdentity);
    }

    let (progress_current, progress_total, stage_hint) = match wire.progress {
        Some(progress) => (progress.current, progress.total, non_empty(progress.stage)),
        None => (None, None, None),
    };

    Ok(StatusMessage {
        task_id,
        status: status
            .as_deref()
            .map(TaskStatus::parse)
            .unwrap_or(TaskStatus::Unspecified),
        progress_current,
        progress_total,
        stage_hint,
        human_message: non_empty(wire.message),
        error_detail: non_empty(wire.error),
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}
