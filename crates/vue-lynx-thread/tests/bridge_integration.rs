//! End-to-end exchanges between a main-thread and a background bridge

use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use vue_lynx_thread::{pair, Bridge, CallError, Layer, MessageKind, ThreadMessage};

/// Background side that answers `increment` calls with a running count
fn counter_service(background: &Bridge) {
    let responder = background.clone();
    let count = Arc::new(AtomicUsize::new(0));
    let _subscription = background.on_message(move |message| {
        if message.kind != MessageKind::MethodCall {
            return;
        }
        if message.payload["method"] == "increment" {
            let value = count.fetch_add(1, Ordering::SeqCst) + 1;
            let _ = responder.respond(message, MessageKind::StateUpdate, json!({ "count": value }));
        }
    });
}

#[tokio::test]
async fn test_method_call_resolves_with_state_update() {
    let (main, background) = pair();
    let main = main.spawn();
    let background = background.spawn();
    counter_service(&background);

    let request = ThreadMessage::with_id(
        "x1",
        MessageKind::MethodCall,
        json!({ "method": "increment" }),
        Layer::Background,
    );
    let response = main.request(request, None).unwrap().await.unwrap();
    assert_eq!(response, json!({ "count": 1 }));
    assert_eq!(main.pending_count(), 0);
}

#[tokio::test]
async fn test_concurrent_calls_are_matched_by_id() {
    let (main, background) = pair();
    let main = main.spawn();
    let background = background.spawn();
    counter_service(&background);

    let calls: Vec<_> = (0..16)
        .map(|_| main.call_method("increment", Value::Null).unwrap())
        .collect();
    let mut counts = Vec::new();
    for call in calls {
        counts.push(call.await.unwrap()["count"].as_u64().unwrap());
    }
    counts.sort_unstable();
    assert_eq!(counts, (1..=16).collect::<Vec<u64>>());
}

#[tokio::test]
async fn test_duplicate_response_resolves_once() {
    let (main, mut background) = pair();
    let main = main.spawn();

    let pending = main.call(MessageKind::MethodCall, json!({})).unwrap();
    let id = pending.id().to_string();

    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    let _sub = main.on_message(move |message| {
        if message.kind == MessageKind::StateUpdate {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });

    assert_eq!(background.inbox.drain(&background.bridge), 1);
    let reply = ThreadMessage::with_id(&*id, MessageKind::StateUpdate, json!(1), Layer::MainThread);
    background.bridge.send(&reply).unwrap();
    background.bridge.send(&reply).unwrap();

    assert_eq!(pending.await.unwrap(), json!(1));
    tokio::time::sleep(Duration::from_millis(20)).await;
    // Both copies reach the handlers, but only one resolved the call.
    assert_eq!(seen.load(Ordering::SeqCst), 2);
    assert_eq!(main.pending_count(), 0);
}

#[tokio::test]
async fn test_unanswered_call_stays_pending() {
    let (main, _background) = pair();
    let main = main.spawn();

    let pending = main.call(MessageKind::MethodCall, json!({ "method": "noop" })).unwrap();
    let waited = tokio::time::timeout(Duration::from_millis(30), pending).await;
    assert!(waited.is_err());
    // The abandoned wait leaves its registry entry behind.
    assert_eq!(main.pending_count(), 1);
}

#[tokio::test]
async fn test_deadline_bounds_unanswered_call() {
    let (main, _background) = pair();
    let main = main.spawn();

    let result = main
        .call_with_deadline(MessageKind::MethodCall, json!({}), Duration::from_millis(20))
        .await;
    assert!(matches!(result, Err(CallError::DeadlineExceeded(_))));
    assert_eq!(main.pending_count(), 0);
}

#[tokio::test]
async fn test_messages_arrive_in_send_order() {
    let (main, background) = pair();
    let main = main.spawn();
    let background = background.spawn();

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let _sub = background.on_message(move |message| {
        let _ = tx.send(message.payload.clone());
    });

    for n in 0..10 {
        main.emit(MessageKind::Render, json!(n)).unwrap();
    }
    for n in 0..10 {
        assert_eq!(rx.recv().await, Some(json!(n)));
    }
}

#[tokio::test]
async fn test_dropped_peer_reports_disconnect() {
    let (main, background) = pair();
    drop(background);
    assert!(matches!(
        main.bridge.emit(MessageKind::Init, Value::Null),
        Err(CallError::Disconnected)
    ));
}

#[tokio::test]
async fn test_inbox_tasks_exit_when_bridges_are_dropped() {
    let (main, background) = pair();
    let (main, main_task) = main.spawn_with_handle();
    let (background, background_task) = background.spawn_with_handle();

    main.emit(MessageKind::Init, Value::Null).unwrap();
    drop(main);
    drop(background);

    let finished = tokio::time::timeout(Duration::from_millis(500), async {
        main_task.await.unwrap();
        background_task.await.unwrap();
    })
    .await;
    assert!(finished.is_ok());
}

#[tokio::test]
async fn test_pending_call_is_abandoned_when_bridges_are_dropped() {
    let (main, background) = pair();
    let main = main.spawn();
    let background = background.spawn();

    let pending = main.call_method("noop", Value::Null).unwrap();
    drop(main);
    drop(background);

    let outcome = tokio::time::timeout(Duration::from_millis(500), pending).await;
    assert!(matches!(outcome, Ok(Err(CallError::Abandoned))));
}
