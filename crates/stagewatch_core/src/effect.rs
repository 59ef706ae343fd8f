use std::fmt;
use std::time::Duration;

use crate::{ConnectionState, ParseFailure, StatusMessage};

/// Side effects requested by `update`, executed by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Open a fresh transport, replacing any previous one.
    OpenTransport,
    CloseTransport,
    /// Arm the single reconnect timer.
    ScheduleReconnect { delay: Duration, attempt: u32 },
    CancelReconnect,
    /// A payload was rejected; log it and move on.
    DropPayload { failure: ParseFailure },
    Emit(Notification),
}

/// What the consumer of a subscription gets told.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    ConnectionChanged(ConnectionState),
    Status(StatusMessage),
    /// Sent exactly once, when the subscription ends on its own.
    Finished(Outcome),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Navigate to the report named by `report_id`.
    Completed {
        report_id: Option<String>,
        message: Option<String>,
    },
    Failed(Failure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub kind: FailureKind,
    pub detail: String,
}

impl Failure {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The server declared the task failed.
    Server,
    /// Transport kept failing until the retry budget ran out.
    RetryBudgetExhausted { attempts: u32 },
    MissingTaskId,
    /// The engine delivering the stream went away before the task finished.
    EngineStopped,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Server => write!(f, "task failed on the server"),
            FailureKind::RetryBudgetExhausted { attempts } => {
                write!(f, "exceeded retry budget after {attempts} reconnect attempts")
            }
            FailureKind::MissingTaskId => write!(f, "missing task id"),
            FailureKind::EngineStopped => write!(f, "stream engine stopped"),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.detail.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.detail)
        }
    }
}
