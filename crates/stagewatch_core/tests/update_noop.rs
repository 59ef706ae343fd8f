use stagewatch_core::{update, Msg, RetryPolicy, SubscriptionState, TaskId};

#[test]
fn closed_subscription_ignores_every_message() {
    let state = SubscriptionState::new(TaskId::parse("t").unwrap(), RetryPolicy::default());
    let (closed, _) = update(state, Msg::Cancel);

    for msg in [
        Msg::Subscribe,
        Msg::TransportOpened,
        Msg::Payload(r#"{"status":"scraping"}"#.to_string()),
        Msg::TransportFailed {
            reason: "gone".to_string(),
        },
        Msg::BackoffElapsed,
        Msg::Cancel,
    ] {
        let (next, effects) = update(closed.clone(), msg);
        assert_eq!(next, closed);
        assert!(effects.is_empty());
    }
}
