use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::future::{self, BoxFuture, FutureExt};
use futures_util::StreamExt;
use stagewatch_core::{
    update, ConnectionState, Effect, Msg, Notification, RetryPolicy, StatusMessage,
    SubscribeError, SubscriptionState, TaskId,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use watch_logging::{watch_debug, watch_info, watch_warn};

use crate::transport::{EventTransport, PayloadStream};
use crate::EngineEvent;

/// Produces the future that waits out one reconnect delay.
pub type DelayFn = Arc<dyn Fn(Duration) -> BoxFuture<'static, ()> + Send + Sync>;

/// Real-time delay backed by the tokio timer.
pub fn tokio_delay() -> DelayFn {
    Arc::new(|delay| tokio::time::sleep(delay).boxed())
}

/// Receives everything a subscription reports.
pub trait StreamSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

pub struct ChannelStreamSink {
    tx: std::sync::mpsc::Sender<EngineEvent>,
}

impl ChannelStreamSink {
    pub fn new(tx: std::sync::mpsc::Sender<EngineEvent>) -> Self {
        Self { tx }
    }
}

impl StreamSink for ChannelStreamSink {
    fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}

/// Latest view of a subscription, readable from outside the driver task.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Health {
    pub connection: ConnectionState,
    pub latest: Option<StatusMessage>,
    pub last_error: Option<String>,
}

impl Health {
    fn of(state: &SubscriptionState) -> Self {
        Self {
            connection: state.connection(),
            latest: state.latest().cloned(),
            last_error: state.last_error().map(ToOwned::to_owned),
        }
    }
}

/// Serialises sink emission against cancellation. `close` waits for an emit in
/// progress, so nothing reaches the sink once it returns.
#[derive(Clone, Default)]
struct EmitGate {
    closed: Arc<Mutex<bool>>,
}

impl EmitGate {
    fn lock(&self) -> MutexGuard<'_, bool> {
        // Poisoning only means a sink panicked; the flag is still valid.
        self.closed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn close(&self) {
        *self.lock() = true;
    }

    fn emit_with(&self, send: impl FnOnce()) {
        let closed = self.lock();
        if !*closed {
            send();
        }
    }
}

/// Opens task subscriptions over a transport.
#[derive(Clone)]
pub struct StreamConnection {
    transport: Arc<dyn EventTransport>,
    policy: RetryPolicy,
    delay: DelayFn,
}

impl StreamConnection {
    pub fn new(transport: Arc<dyn EventTransport>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            policy,
            delay: tokio_delay(),
        }
    }

    /// Replaces the reconnect delay, e.g. to record or skip waits in tests.
    pub fn with_delay(mut self, delay: DelayFn) -> Self {
        self.delay = delay;
        self
    }

    /// Starts streaming `task_id` into `sink`. Must be called inside a tokio runtime.
    ///
    /// A blank task id fails immediately; nothing is spawned.
    pub fn subscribe(
        &self,
        task_id: &str,
        sink: Arc<dyn StreamSink>,
    ) -> Result<Subscription, SubscribeError> {
        let task_id = TaskId::parse(task_id)?;
        let state = SubscriptionState::new(task_id.clone(), self.policy);
        let token = CancellationToken::new();
        let gate = EmitGate::default();
        let (health_tx, health_rx) = watch::channel(Health::of(&state));

        let driver = Driver {
            transport: self.transport.clone(),
            delay: self.delay.clone(),
            sink,
            token: token.clone(),
            gate: gate.clone(),
            health: health_tx,
        };
        watch_info!("subscribing to task {}", task_id);
        let handle = tokio::spawn(driver.run(state));

        Ok(Subscription {
            task_id,
            token,
            gate,
            health: health_rx,
            driver: Some(handle),
        })
    }
}

/// Handle to one live task stream. Dropping it cancels the stream.
pub struct Subscription {
    task_id: TaskId,
    token: CancellationToken,
    gate: EmitGate,
    health: watch::Receiver<Health>,
    driver: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    pub fn state(&self) -> ConnectionState {
        if self.token.is_cancelled() {
            return ConnectionState::Closed;
        }
        self.health.borrow().connection
    }

    pub fn latest(&self) -> Option<StatusMessage> {
        self.health.borrow().latest.clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.health.borrow().last_error.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state() == ConnectionState::Closed
    }

    /// Closes the connection and any pending reconnect. Safe to repeat.
    ///
    /// Once this returns, the sink receives nothing more.
    pub fn cancel(&self) {
        if !self.token.is_cancelled() {
            watch_debug!("cancelling subscription for task {}", self.task_id);
        }
        self.gate.close();
        self.token.cancel();
    }

    /// Waits until the driver task has finished tearing down.
    pub async fn closed(&mut self) {
        if let Some(handle) = self.driver.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.gate.close();
        self.token.cancel();
    }
}

struct Driver {
    transport: Arc<dyn EventTransport>,
    delay: DelayFn,
    sink: Arc<dyn StreamSink>,
    token: CancellationToken,
    gate: EmitGate,
    health: watch::Sender<Health>,
}

impl Driver {
    async fn run(self, mut state: SubscriptionState) {
        // Single owned connection and timer; each is replaced, never duplicated.
        let mut stream: Option<PayloadStream> = None;
        let mut timer: Option<BoxFuture<'static, ()>> = None;
        let mut inbox = VecDeque::from([Msg::Subscribe]);

        loop {
            while let Some(msg) = inbox.pop_front() {
                let (next, effects) = update(state, msg);
                state = next;
                self.health.send_replace(Health::of(&state));

                for effect in effects {
                    match effect {
                        Effect::OpenTransport => {
                            drop(stream.take());
                            let (opened, reply) = self.open(state.task_id()).await;
                            stream = opened;
                            inbox.push_back(reply);
                        }
                        Effect::CloseTransport => {
                            if stream.take().is_some() {
                                watch_debug!("closed transport for task {}", state.task_id());
                            }
                        }
                        Effect::ScheduleReconnect { delay, attempt } => {
                            watch_info!(
                                "task {}: reconnect attempt {} in {:?} ({})",
                                state.task_id(),
                                attempt,
                                delay,
                                state.last_error().unwrap_or("transport error")
                            );
                            timer = Some((self.delay)(delay));
                        }
                        Effect::CancelReconnect => {
                            timer = None;
                        }
                        Effect::DropPayload { failure } => {
                            watch_warn!("task {}: dropped payload: {}", state.task_id(), failure);
                        }
                        Effect::Emit(notification) => self.emit(&state, notification),
                    }
                }
            }

            if state.is_closed() {
                break;
            }

            let next_payload = async {
                match stream.as_mut() {
                    Some(payloads) => payloads.next().await,
                    None => future::pending().await,
                }
            };
            let next_timer = async {
                match timer.as_mut() {
                    Some(wait) => wait.await,
                    None => future::pending().await,
                }
            };

            let msg = tokio::select! {
                biased;
                _ = self.token.cancelled() => Msg::Cancel,
                _ = next_timer => Msg::BackoffElapsed,
                item = next_payload => match item {
                    Some(Ok(payload)) => Msg::Payload(payload),
                    Some(Err(err)) => Msg::TransportFailed { reason: err.to_string() },
                    None => Msg::TransportFailed { reason: "event stream ended".to_string() },
                },
            };
            if msg == Msg::BackoffElapsed {
                timer = None;
            }
            inbox.push_back(msg);
        }

        watch_info!("subscription for task {} closed", state.task_id());
    }

    /// Connects unless cancelled first; returns the new stream and the message to apply.
    async fn open(&self, task_id: &TaskId) -> (Option<PayloadStream>, Msg) {
        watch_debug!("connecting to task {}", task_id);
        tokio::select! {
            biased;
            _ = self.token.cancelled() => (None, Msg::Cancel),
            result = self.transport.connect(task_id) => match result {
                Ok(payloads) => (Some(payloads), Msg::TransportOpened),
                Err(err) => {
                    watch_warn!("task {}: connect failed: {}", task_id, err);
                    (None, Msg::TransportFailed { reason: err.to_string() })
                }
            },
        }
    }

    fn emit(&self, state: &SubscriptionState, notification: Notification) {
        self.gate.emit_with(|| {
            self.sink.emit(EngineEvent {
                task_id: state.task_id().to_string(),
                notification,
            })
        });
    }
}
