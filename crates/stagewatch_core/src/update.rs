use crate::{
    decode_status, ConnectionState, Effect, Failure, FailureKind, Msg, Notification, Outcome,
    ParseFailure, StatusMessage, SubscriptionState, TaskStatus,
};

/// Pure update function: applies a message to a subscription and returns the
/// effects the engine must carry out. A closed subscription ignores everything.
pub fn update(mut state: SubscriptionState, msg: Msg) -> (SubscriptionState, Vec<Effect>) {
    if state.is_closed() {
        return (state, Vec::new());
    }

    let effects = match msg {
        Msg::Subscribe => {
            if state.connection() == ConnectionState::Idle {
                connect(&mut state)
            } else {
                Vec::new()
            }
        }
        Msg::TransportOpened => match state.connection() {
            ConnectionState::Connecting | ConnectionState::Open => open(&mut state),
            _ => Vec::new(),
        },
        Msg::Payload(raw) => match state.connection() {
            ConnectionState::Connecting | ConnectionState::Open => on_payload(&mut state, &raw),
            _ => Vec::new(),
        },
        Msg::TransportFailed { reason } => match state.connection() {
            ConnectionState::Connecting | ConnectionState::Open => on_failure(&mut state, reason),
            _ => Vec::new(),
        },
        Msg::BackoffElapsed => {
            if state.connection() == ConnectionState::Reconnecting {
                connect(&mut state)
            } else {
                Vec::new()
            }
        }
        Msg::Cancel => {
            state.set_connection(ConnectionState::Closed);
            vec![Effect::CancelReconnect, Effect::CloseTransport]
        }
    };

    (state, effects)
}

fn connect(state: &mut SubscriptionState) -> Vec<Effect> {
    state.set_connection(ConnectionState::Connecting);
    vec![
        Effect::Emit(Notification::ConnectionChanged(ConnectionState::Connecting)),
        Effect::OpenTransport,
    ]
}

fn open(state: &mut SubscriptionState) -> Vec<Effect> {
    state.mark_opened();
    if state.set_connection(ConnectionState::Open) {
        vec![Effect::Emit(Notification::ConnectionChanged(
            ConnectionState::Open,
        ))]
    } else {
        Vec::new()
    }
}

fn on_payload(state: &mut SubscriptionState, raw: &str) -> Vec<Effect> {
    let msg = match decode_status(raw).and_then(|msg| check_task(state, msg)) {
        Ok(msg) => msg,
        Err(failure) => return vec![Effect::DropPayload { failure }],
    };

    let mut effects = open(state);
    state.set_latest(msg.clone());
    effects.push(Effect::Emit(Notification::Status(msg.clone())));

    if msg.is_terminal() {
        state.set_connection(ConnectionState::Closed);
        effects.push(Effect::CloseTransport);
        effects.push(Effect::Emit(Notification::ConnectionChanged(
            ConnectionState::Closed,
        )));
        effects.push(Effect::Emit(Notification::Finished(terminal_outcome(msg))));
    }
    effects
}

fn check_task(state: &SubscriptionState, msg: StatusMessage) -> Result<StatusMessage, ParseFailure> {
    match msg.task_id.as_deref() {
        Some(found) if found != state.task_id().as_str() => Err(ParseFailure::ForeignTask {
            expected: state.task_id().to_string(),
            found: found.to_string(),
        }),
        _ => Ok(msg),
    }
}

fn terminal_outcome(msg: StatusMessage) -> Outcome {
    if msg.status == TaskStatus::Completed {
        return Outcome::Completed {
            report_id: msg.stage_hint,
            message: msg.human_message,
        };
    }
    let detail = msg
        .error_detail
        .or(msg.human_message)
        .unwrap_or_default();
    Outcome::Failed(Failure::new(FailureKind::Server, detail))
}

fn on_failure(state: &mut SubscriptionState, reason: String) -> Vec<Effect> {
    state.record_failure(reason.clone());
    let mut effects = vec![Effect::CloseTransport];

    match state.schedule_retry() {
        Some((delay, attempt)) => {
            state.set_connection(ConnectionState::Reconnecting);
            effects.push(Effect::Emit(Notification::ConnectionChanged(
                ConnectionState::Reconnecting,
            )));
            effects.push(Effect::ScheduleReconnect { delay, attempt });
        }
        None => {
            state.set_connection(ConnectionState::Closed);
            let attempts = state.budget().attempt;
            effects.push(Effect::Emit(Notification::ConnectionChanged(
                ConnectionState::Closed,
            )));
            effects.push(Effect::Emit(Notification::Finished(Outcome::Failed(
                Failure::new(FailureKind::RetryBudgetExhausted { attempts }, reason),
            ))));
        }
    }
    effects
}
