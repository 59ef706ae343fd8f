use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::{mpsc, Arc};
use std::thread;

use stagewatch_core::{Failure, FailureKind, Notification, Outcome};
use watch_logging::{watch_error, watch_info, watch_warn};

use crate::connection::{ChannelStreamSink, StreamConnection, StreamSink, Subscription};
use crate::transport::ReqwestTransport;
use crate::{EngineEvent, EngineStopped, StreamSettings};

enum EngineCommand {
    Subscribe { task_id: String },
    Cancel { task_id: String },
    Shutdown,
}

/// Runs subscriptions on a background tokio runtime and hands their events to
/// a single consumer thread through `try_recv`.
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
}

impl EngineHandle {
    pub fn new(settings: StreamSettings) -> Self {
        let policy = settings.retry;
        let connection = StreamConnection::new(Arc::new(ReqwestTransport::new(settings)), policy);
        Self::with_connection(connection)
    }

    pub fn with_connection(connection: StreamConnection) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();

        thread::spawn(move || {
            let runtime = match tokio::runtime::Runtime::new() {
                Ok(runtime) => runtime,
                Err(err) => {
                    watch_error!("cannot start engine runtime: {}", err);
                    return;
                }
            };
            let sink: Arc<dyn StreamSink> = Arc::new(ChannelStreamSink::new(event_tx));
            let mut subscriptions: HashMap<String, Subscription> = HashMap::new();

            while let Ok(command) = cmd_rx.recv() {
                subscriptions.retain(|_, subscription| !subscription.is_closed());
                let _guard = runtime.enter();
                if handle_command(&connection, &sink, &mut subscriptions, command).is_break() {
                    break;
                }
            }
            watch_info!("engine stopping with {} live subscriptions", subscriptions.len());
        });

        Self { cmd_tx, event_rx }
    }

    /// Starts streaming a task; an existing subscription for the same id is replaced.
    pub fn subscribe(&self, task_id: impl Into<String>) {
        let _ = self.cmd_tx.send(EngineCommand::Subscribe {
            task_id: task_id.into(),
        });
    }

    pub fn cancel(&self, task_id: impl Into<String>) {
        let _ = self.cmd_tx.send(EngineCommand::Cancel {
            task_id: task_id.into(),
        });
    }

    /// Cancels every subscription and stops the engine thread.
    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(EngineCommand::Shutdown);
    }

    /// Next queued event, if any. Fails once the engine thread has exited and
    /// every queued event has been drained.
    pub fn try_recv(&self) -> Result<Option<EngineEvent>, EngineStopped> {
        match self.event_rx.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(mpsc::TryRecvError::Empty) => Ok(None),
            Err(mpsc::TryRecvError::Disconnected) => Err(EngineStopped),
        }
    }
}

fn handle_command(
    connection: &StreamConnection,
    sink: &Arc<dyn StreamSink>,
    subscriptions: &mut HashMap<String, Subscription>,
    command: EngineCommand,
) -> ControlFlow<()> {
    match command {
        EngineCommand::Subscribe { task_id } => {
            // At most one live stream per task: the old handle is cancelled on drop.
            if let Some(previous) = subscriptions.remove(task_id.trim()) {
                previous.cancel();
            }
            match connection.subscribe(&task_id, sink.clone()) {
                Ok(subscription) => {
                    subscriptions.insert(subscription.task_id().to_string(), subscription);
                }
                Err(err) => {
                    watch_warn!("refusing subscription: {}", err);
                    sink.emit(EngineEvent {
                        task_id,
                        notification: Notification::Finished(Outcome::Failed(Failure::new(
                            FailureKind::MissingTaskId,
                            err.to_string(),
                        ))),
                    });
                }
            }
        }
        EngineCommand::Cancel { task_id } => {
            if let Some(subscription) = subscriptions.remove(task_id.trim()) {
                subscription.cancel();
            }
        }
        EngineCommand::Shutdown => {
            for (_, subscription) in subscriptions.drain() {
                subscription.cancel();
            }
            return ControlFlow::Break(());
        }
    }
    ControlFlow::Continue(())
}
