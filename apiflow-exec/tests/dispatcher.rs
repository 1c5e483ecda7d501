use std::sync::Arc;

use apiflow_core::types::ExecutionState;
use apiflow_core::Id;
use apiflow_exec::executor::{DispatcherEventSink, Event, EventSink, StatusDispatcher, Topic};
use serde_json::json;

fn var_set(run_id: Id, n: i64) -> Event {
    Event::VarSet {
        run_id,
        name: format!("n{n}"),
        value: json!(n),
    }
}

#[tokio::test]
async fn subscribers_receive_their_topic_in_order() {
    let dispatcher = StatusDispatcher::spawn(10);
    let run = Id::new();
    let mut rx = dispatcher.subscribe(Topic::Run(run));
    let mut other = dispatcher.subscribe(Topic::Run(Id::new()));

    for n in 0..3 {
        dispatcher.publish(Topic::Run(run), var_set(run, n));
    }
    for n in 0..3 {
        assert_eq!(rx.recv().await.unwrap(), var_set(run, n));
    }
    assert!(other.try_recv().is_err());
}

#[tokio::test]
async fn slow_subscriber_is_dropped() {
    let dispatcher = StatusDispatcher::spawn(2);
    let run = Id::new();
    let mut rx = dispatcher.subscribe(Topic::Run(run));

    for n in 0..5 {
        dispatcher.publish(Topic::Run(run), var_set(run, n));
    }

    assert_eq!(rx.recv().await.unwrap(), var_set(run, 0));
    assert_eq!(rx.recv().await.unwrap(), var_set(run, 1));
    // The third event overflowed the buffer; the subscription was closed.
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn sink_publishes_on_run_and_user_topics() {
    let dispatcher = Arc::new(StatusDispatcher::spawn(10));
    let user = Id::new();
    let run = Id::new();
    let mut by_user = dispatcher.subscribe(Topic::User(user));
    let mut by_run = dispatcher.subscribe(Topic::Run(run));

    let sink = DispatcherEventSink::for_user(Arc::clone(&dispatcher), user);
    let ev = Event::RunStarted {
        run_id: run,
        flow_id: Id::new(),
    };
    sink.emit(ev.clone()).await;

    assert_eq!(by_user.recv().await.unwrap(), ev);
    assert_eq!(by_run.recv().await.unwrap(), ev);
}

#[tokio::test]
async fn dropped_receiver_releases_its_topic() {
    let dispatcher = StatusDispatcher::spawn(10);
    let run = Id::new();
    let rx = dispatcher.subscribe(Topic::Run(run));
    assert_eq!(dispatcher.subscriber_count(Topic::Run(run)).await, 1);

    drop(rx);
    assert_eq!(dispatcher.subscriber_count(Topic::Run(run)).await, 0);
}

#[tokio::test]
async fn run_topic_closes_after_run_finished() {
    let dispatcher = StatusDispatcher::spawn(10);
    let run = Id::new();
    let mut rx = dispatcher.subscribe(Topic::Run(run));

    let done = Event::RunFinished {
        run_id: run,
        state: ExecutionState::Success,
        error: None,
    };
    dispatcher.publish(Topic::Run(run), var_set(run, 0));
    dispatcher.publish(Topic::Run(run), done.clone());

    assert_eq!(rx.recv().await.unwrap(), var_set(run, 0));
    assert_eq!(rx.recv().await.unwrap(), done);
    assert!(rx.recv().await.is_none());
    assert_eq!(dispatcher.subscriber_count(Topic::Run(run)).await, 0);
}
