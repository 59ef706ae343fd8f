use std::fmt;

use thiserror::Error;

/// Opaque identifier of one backend analysis job.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskId(String);

impl TaskId {
    /// Accepts any non-blank identifier. Surrounding whitespace is trimmed.
    pub fn parse(raw: &str) -> Result<Self, SubscribeError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(SubscribeError::MissingTaskId);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Caller contract violations detected before any connection is attempted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscribeError {
    #[error("task id is missing or blank")]
    MissingTaskId,
}
