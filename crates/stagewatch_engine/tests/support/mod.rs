#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use futures_util::future::{self, FutureExt};
use futures_util::stream::{self, StreamExt};
use stagewatch_core::{Notification, Outcome, TaskId};
use stagewatch_engine::{
    DelayFn, EngineEvent, EventTransport, PayloadStream, StreamSink, TransportError,
    TransportErrorKind,
};

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(watch_logging::initialize_for_tests);
}

/// What one `connect` call does.
pub enum Script {
    Refuse,
    /// Yields the payloads, then stays open forever.
    Hold(Vec<String>),
    /// Yields the payloads, then the server closes the stream.
    End(Vec<String>),
    /// The connect call never completes.
    Stall,
    /// Repeats one payload for as long as the stream is read.
    Flood(String),
}

#[derive(Default)]
pub struct Counters {
    pub connects: AtomicUsize,
    pub live: AtomicUsize,
    pub max_live: AtomicUsize,
    pub closed: AtomicUsize,
}

struct LiveGuard(Arc<Counters>);

impl LiveGuard {
    fn new(counters: Arc<Counters>) -> Self {
        let live = counters.live.fetch_add(1, Ordering::SeqCst) + 1;
        counters.max_live.fetch_max(live, Ordering::SeqCst);
        Self(counters)
    }
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.live.fetch_sub(1, Ordering::SeqCst);
        self.0.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Plays back one script per connection; refuses once the scripts run out.
pub struct ScriptedTransport {
    scripts: Mutex<VecDeque<Script>>,
    pub counters: Arc<Counters>,
}

impl ScriptedTransport {
    pub fn new(scripts: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            counters: Arc::new(Counters::default()),
        })
    }

    pub fn connects(&self) -> usize {
        self.counters.connects.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl EventTransport for ScriptedTransport {
    async fn connect(&self, _task_id: &TaskId) -> Result<PayloadStream, TransportError> {
        self.counters.connects.fetch_add(1, Ordering::SeqCst);
        let script = self.scripts.lock().unwrap().pop_front();
        let (payloads, hold) = match script {
            None | Some(Script::Refuse) => {
                return Err(TransportError::new(
                    TransportErrorKind::Connect,
                    "connection refused",
                ))
            }
            Some(Script::Stall) => {
                let _pending_connect = LiveGuard::new(self.counters.clone());
                return future::pending().await;
            }
            Some(Script::Flood(payload)) => {
                let guard = LiveGuard::new(self.counters.clone());
                let flood: PayloadStream = stream::repeat(payload)
                    .then(|payload| async move {
                        tokio::task::yield_now().await;
                        Ok::<_, TransportError>(payload)
                    })
                    .map(move |item| {
                        let _keep = &guard;
                        item
                    })
                    .boxed();
                return Ok(flood);
            }
            Some(Script::Hold(payloads)) => (payloads, true),
            Some(Script::End(payloads)) => (payloads, false),
        };

        let guard = LiveGuard::new(self.counters.clone());
        let items = stream::iter(payloads.into_iter().map(Ok));
        let tail: PayloadStream = if hold {
            stream::pending().boxed()
        } else {
            stream::once(async {
                Err(TransportError::new(TransportErrorKind::Closed, "end of stream"))
            })
            .boxed()
        };
        let items: PayloadStream = items.boxed();
        Ok(items
            .chain(tail)
            .map(move |item| {
                let _keep = &guard;
                item
            })
            .boxed())
    }
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<EngineEvent>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|event| event.notification.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn outcomes(&self) -> Vec<Outcome> {
        self.notifications()
            .into_iter()
            .filter_map(|notification| match notification {
                Notification::Finished(outcome) => Some(outcome),
                _ => None,
            })
            .collect()
    }
}

impl StreamSink for RecordingSink {
    fn emit(&self, event: EngineEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Counts emissions, and separately those arriving after `mark_cancelled`.
#[derive(Default)]
pub struct LateEmitSink {
    emitted: AtomicUsize,
    late: AtomicUsize,
    cancelled: AtomicBool,
}

impl LateEmitSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn emitted(&self) -> usize {
        self.emitted.load(Ordering::SeqCst)
    }

    pub fn late(&self) -> usize {
        self.late.load(Ordering::SeqCst)
    }

    pub fn mark_cancelled(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

impl StreamSink for LateEmitSink {
    fn emit(&self, _event: EngineEvent) {
        self.emitted.fetch_add(1, Ordering::SeqCst);
        if self.cancelled.load(Ordering::SeqCst) {
            self.late.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Records every requested delay and returns at once.
pub fn instant_delay() -> (DelayFn, Arc<Mutex<Vec<Duration>>>) {
    let requested = Arc::new(Mutex::new(Vec::new()));
    let log = requested.clone();
    let delay: DelayFn = Arc::new(move |delay: Duration| {
        log.lock().unwrap().push(delay);
        future::ready(()).boxed()
    });
    (delay, requested)
}

/// Records every requested delay and never fires.
pub fn frozen_delay() -> (DelayFn, Arc<Mutex<Vec<Duration>>>) {
    let requested = Arc::new(Mutex::new(Vec::new()));
    let log = requested.clone();
    let delay: DelayFn = Arc::new(move |delay: Duration| {
        log.lock().unwrap().push(delay);
        future::pending::<()>().boxed()
    });
    (delay, requested)
}

/// Polls `condition` until it holds or a generous deadline passes.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

pub fn payload(json: &str) -> String {
    json.to_string()
}
