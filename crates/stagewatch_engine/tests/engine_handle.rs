mod support;

use std::thread;
use std::time::{Duration, Instant};

use stagewatch_core::{FailureKind, Notification, Outcome, RetryPolicy};
use stagewatch_engine::{EngineEvent, EngineHandle, EngineStopped, StreamConnection};

use support::{init_logging, payload, Script, ScriptedTransport};

fn drain_until_finished(engine: &EngineHandle) -> Vec<EngineEvent> {
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut events = Vec::new();
    while Instant::now() < deadline {
        match engine.try_recv().expect("engine running") {
            Some(event) => {
                let finished = matches!(event.notification, Notification::Finished(_));
                events.push(event);
                if finished {
                    return events;
                }
            }
            None => thread::sleep(Duration::from_millis(10)),
        }
    }
    panic!("no terminal event within deadline: {events:?}");
}

#[test]
fn engine_delivers_events_to_the_polling_thread() {
    init_logging();
    let transport = ScriptedTransport::new(vec![Script::Hold(vec![
        payload(r#"{"task_id":"job-3","status":"generating","progress":{"current":90}}"#),
        payload(r#"{"task_id":"job-3","status":"completed","progress":{"stage":"12"}}"#),
    ])]);
    let engine = EngineHandle::with_connection(StreamConnection::new(
        transport.clone(),
        RetryPolicy::default(),
    ));

    engine.subscribe("job-3");
    let events = drain_until_finished(&engine);

    assert!(events.iter().all(|event| event.task_id == "job-3"));
    assert_eq!(
        events.last().map(|event| event.notification.clone()),
        Some(Notification::Finished(Outcome::Completed {
            report_id: Some("12".to_string()),
            message: None,
        }))
    );
    assert_eq!(transport.connects(), 1);
}

#[test]
fn engine_reports_missing_task_id_as_failure() {
    init_logging();
    let transport = ScriptedTransport::new(Vec::new());
    let engine = EngineHandle::with_connection(StreamConnection::new(
        transport.clone(),
        RetryPolicy::default(),
    ));

    engine.subscribe("");
    let events = drain_until_finished(&engine);

    match &events[..] {
        [EngineEvent {
            notification: Notification::Finished(Outcome::Failed(failure)),
            ..
        }] => assert_eq!(failure.kind, FailureKind::MissingTaskId),
        other => panic!("unexpected events {other:?}"),
    }
    assert_eq!(transport.connects(), 0);
}

#[test]
fn resubscribing_replaces_the_previous_stream() {
    init_logging();
    let transport = ScriptedTransport::new(vec![
        Script::Hold(Vec::new()),
        Script::Hold(vec![payload(
            r#"{"task_id":"job-4","status":"completed","progress":{"stage":"8"}}"#,
        )]),
    ]);
    let engine = EngineHandle::with_connection(StreamConnection::new(
        transport.clone(),
        RetryPolicy::default(),
    ));

    engine.subscribe("job-4");
    let deadline = Instant::now() + Duration::from_secs(5);
    while transport.connects() < 1 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    engine.subscribe("job-4");
    drain_until_finished(&engine);

    let deadline = Instant::now() + Duration::from_secs(5);
    while transport.counters.live.load(std::sync::atomic::Ordering::SeqCst) > 0
        && Instant::now() < deadline
    {
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(transport.connects(), 2);
    assert_eq!(
        transport
            .counters
            .live
            .load(std::sync::atomic::Ordering::SeqCst),
        0
    );
}

#[test]
fn shutdown_cancels_streams_and_reports_stopped() {
    init_logging();
    let transport = ScriptedTransport::new(vec![Script::Hold(Vec::new())]);
    let engine = EngineHandle::with_connection(StreamConnection::new(
        transport.clone(),
        RetryPolicy::default(),
    ));

    engine.subscribe("job-5");
    let deadline = Instant::now() + Duration::from_secs(5);
    while transport.connects() < 1 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    engine.shutdown();

    let deadline = Instant::now() + Duration::from_secs(5);
    let stopped = loop {
        match engine.try_recv() {
            Ok(Some(_)) => continue,
            Ok(None) if Instant::now() < deadline => thread::sleep(Duration::from_millis(10)),
            Ok(None) => panic!("engine still running after shutdown"),
            Err(stopped) => break stopped,
        }
    };
    assert_eq!(stopped, EngineStopped);
    assert_eq!(
        transport
            .counters
            .live
            .load(std::sync::atomic::Ordering::SeqCst),
        0
    );
}
