use std::fmt;
use std::time::Duration;

use stagewatch_core::{Notification, RetryPolicy};
use thiserror::Error;

/// Where and how to open task event streams.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub base_url: String,
    pub endpoint_path: String,
    pub connect_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            endpoint_path: "/api/sse".to_string(),
            connect_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
        }
    }
}

/// A notification tagged with the task it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineEvent {
    pub task_id: String,
    pub notification: Notification,
}

/// The engine thread is gone; no further events will arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("stream engine stopped")]
pub struct EngineStopped;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportErrorKind {
    InvalidUrl,
    Connect,
    Timeout,
    HttpStatus(u16),
    UnexpectedContentType { content_type: String },
    /// Body read failed mid-stream.
    Stream,
    /// Server ended the stream without a terminal status.
    Closed,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportErrorKind::InvalidUrl => write!(f, "invalid url"),
            TransportErrorKind::Connect => write!(f, "connection failed"),
            TransportErrorKind::Timeout => write!(f, "timeout"),
            TransportErrorKind::HttpStatus(code) => write!(f, "http status {code}"),
            TransportErrorKind::UnexpectedContentType { content_type } => {
                write!(f, "unexpected content type {content_type}")
            }
            TransportErrorKind::Stream => write!(f, "stream read failed"),
            TransportErrorKind::Closed => write!(f, "stream closed by server"),
        }
    }
}
