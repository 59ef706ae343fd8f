//! Incremental `text/event-stream` framing.
//!
//! Splits a byte stream into events. Lines end in LF or CRLF; UTF-8 is only
//! decoded once a whole line is buffered, so chunk boundaries may fall inside
//! a multi-byte character.

use bytes::{Buf, BytesMut};

const DEFAULT_EVENT: &str = "message";

/// One dispatched event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SseEvent {
    /// From `event:`; `message` when absent or blank.
    pub(crate) event: String,
    /// `data:` lines joined with `\n`.
    pub(crate) data: String,
}

impl SseEvent {
    /// Payload of a default-typed event; other event types are not status updates.
    pub(crate) fn into_message_data(self) -> Option<String> {
        (self.event == DEFAULT_EVENT).then_some(self.data)
    }
}

#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    buffer: BytesMut,
    event: Option<String>,
    data: Vec<String>,
    bom_checked: bool,
}

impl SseDecoder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns every event completed by it.
    pub(crate) fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        if !self.bom_checked {
            if self.buffer.len() < 3 && !self.buffer.contains(&b'\n') {
                return Vec::new();
            }
            self.bom_checked = true;
            if self.buffer.starts_with(&[0xEF, 0xBB, 0xBF]) {
                self.buffer.advance(3);
            }
        }

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let mut line = self.buffer.split_to(pos + 1);
            line.truncate(pos);
            if line.last() == Some(&b'\r') {
                line.truncate(pos - 1);
            }
            let line = String::from_utf8_lossy(&line);
            if line.is_empty() {
                if let Some(event) = self.dispatch() {
                    events.push(event);
                }
            } else {
                self.process_line(&line);
            }
        }
        events
    }

    /// Whether a partial line or an undispatched event is buffered.
    pub(crate) fn has_pending(&self) -> bool {
        !self.buffer.is_empty() || !self.data.is_empty()
    }

    fn process_line(&mut self, line: &str) {
        if line.starts_with(':') {
            // keep-alive comment
            return;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            // `id` and `retry` are unused: reconnects always start fresh and
            // follow the retry policy.
            _ => {}
        }
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent {
            event: event
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| DEFAULT_EVENT.to_string()),
            data,
        })
    }
}
