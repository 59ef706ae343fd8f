use std::collections::VecDeque;

use futures_util::stream::{self, BoxStream, StreamExt};
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use stagewatch_core::TaskId;
use url::Url;
use watch_logging::watch_debug;

use crate::sse::SseDecoder;
use crate::{StreamSettings, TransportError, TransportErrorKind};

/// Event payloads of one live connection. Ends after the first error.
pub type PayloadStream = BoxStream<'static, Result<String, TransportError>>;

/// Opens one server-push connection per call.
#[async_trait::async_trait]
pub trait EventTransport: Send + Sync {
    async fn connect(&self, task_id: &TaskId) -> Result<PayloadStream, TransportError>;
}

/// `text/event-stream` over HTTP.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    settings: StreamSettings,
}

impl ReqwestTransport {
    pub fn new(settings: StreamSettings) -> Self {
        Self { settings }
    }

    pub fn endpoint_url(&self, task_id: &TaskId) -> Result<Url, TransportError> {
        let base = Url::parse(&self.settings.base_url)
            .map_err(|err| TransportError::new(TransportErrorKind::InvalidUrl, err.to_string()))?;
        let mut url = base
            .join(&self.settings.endpoint_path)
            .map_err(|err| TransportError::new(TransportErrorKind::InvalidUrl, err.to_string()))?;
        url.query_pairs_mut().append_pair("task_id", task_id.as_str());
        Ok(url)
    }

    fn build_client(&self) -> Result<reqwest::Client, TransportError> {
        // No overall timeout: the response body lives as long as the task.
        reqwest::Client::builder()
            .connect_timeout(self.settings.connect_timeout)
            .build()
            .map_err(|err| TransportError::new(TransportErrorKind::Connect, err.to_string()))
    }
}

#[async_trait::async_trait]
impl EventTransport for ReqwestTransport {
    async fn connect(&self, task_id: &TaskId) -> Result<PayloadStream, TransportError> {
        let url = self.endpoint_url(task_id)?;
        let client = self.build_client()?;

        let response = client
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::new(
                TransportErrorKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        if let Some(content_type) = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
        {
            if !is_event_stream(content_type) {
                return Err(TransportError::new(
                    TransportErrorKind::UnexpectedContentType {
                        content_type: content_type.to_string(),
                    },
                    "expected text/event-stream",
                ));
            }
        }

        Ok(payloads(response))
    }
}

fn is_event_stream(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .eq_ignore_ascii_case("text/event-stream")
}

struct BodyState {
    body: BoxStream<'static, reqwest::Result<bytes::Bytes>>,
    decoder: SseDecoder,
    ready: VecDeque<String>,
    finished: bool,
}

fn payloads(response: reqwest::Response) -> PayloadStream {
    let state = BodyState {
        body: response.bytes_stream().boxed(),
        decoder: SseDecoder::new(),
        ready: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        if state.finished {
            return None;
        }
        loop {
            if let Some(payload) = state.ready.pop_front() {
                return Some((Ok(payload), state));
            }
            match state.body.next().await {
                Some(Ok(chunk)) => {
                    let events = state.decoder.feed(&chunk);
                    state
                        .ready
                        .extend(events.into_iter().filter_map(|event| event.into_message_data()));
                }
                Some(Err(err)) => {
                    state.finished = true;
                    return Some((Err(map_reqwest_error(err)), state));
                }
                None => {
                    state.finished = true;
                    if state.decoder.has_pending() {
                        watch_debug!("discarding unterminated event at end of stream");
                    }
                    let err = TransportError::new(TransportErrorKind::Closed, "end of stream");
                    return Some((Err(err), state));
                }
            }
        }
    })
    .boxed()
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        return TransportError::new(TransportErrorKind::Timeout, err.to_string());
    }
    if err.is_body() || err.is_decode() {
        return TransportError::new(TransportErrorKind::Stream, err.to_string());
    }
    TransportError::new(TransportErrorKind::Connect, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_carries_task_id_query() {
        let transport = ReqwestTransport::new(StreamSettings {
            base_url: "http://example.test:8080".to_string(),
            ..StreamSettings::default()
        });
        let url = transport
            .endpoint_url(&TaskId::parse("a b&c").unwrap())
            .unwrap();
        assert_eq!(url.as_str(), "http://example.test:8080/api/sse?task_id=a+b%26c");
    }

    #[test]
    fn content_type_parameters_are_ignored() {
        assert!(is_event_stream("text/event-stream; charset=utf-8"));
        assert!(is_event_stream("Text/Event-Stream"));
        assert!(!is_event_stream("application/json"));
    }
}
