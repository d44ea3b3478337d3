//! Contract Test: Config Watcher
//!
//! Constraints verified:
//! - The initial fetch is decoded before the watcher is returned
//! - Every change on the source stream is decoded and published
//! - A change that fails to decode leaves the previous value in place
//! - Identical content is not re-applied
//! - Shutdown terminates the watcher deterministically
//! - A full event channel drops events without stalling the watcher

mod common;

use common::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use svckit_core::{ConfigWatcher, WatchEvent};
use tokio::time::{Duration, timeout};

async fn next_event(rx: &mut tokio::sync::mpsc::Receiver<WatchEvent>) -> WatchEvent {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("event within 5 seconds")
        .expect("event channel open")
}

#[tokio::test]
async fn initial_content_is_decoded() {
    let (source, _tx) = ControlledConfigSource::new(r#"{"name":"orders","replicas":2}"#);

    let (_watcher, handle, _events) = ConfigWatcher::<AppConfig>::new(Box::new(source), 16)
        .await
        .expect("watcher construction succeeds");

    assert_eq!(
        *handle.current(),
        AppConfig {
            name: "orders".to_string(),
            replicas: 2
        }
    );
}

#[tokio::test]
async fn undecodable_initial_content_fails_construction() {
    let (source, _tx) = ControlledConfigSource::new("not json");

    let result = ConfigWatcher::<AppConfig>::new(Box::new(source), 16).await;
    assert!(result.is_err(), "construction must fail on undecodable content");
}

#[tokio::test]
async fn change_is_published_and_callback_invoked() {
    let (source, tx) = ControlledConfigSource::new(r#"{"name":"orders"}"#);
    let callback_calls = Arc::new(AtomicUsize::new(0));
    let calls = Arc::clone(&callback_calls);

    let (watcher, mut handle, mut events) =
        ConfigWatcher::<AppConfig>::new(Box::new(source), 16).await.unwrap();
    let watcher = watcher.on_change(move |config: &AppConfig| {
        assert_eq!(config.replicas, 3);
        calls.fetch_add(1, Ordering::SeqCst);
    });

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let task = tokio::spawn(async move { watcher.run_with_shutdown(Some(shutdown_rx)).await });

    assert!(matches!(next_event(&mut events).await, WatchEvent::Started { .. }));

    tx.send(change("app.json", r#"{"name":"orders","replicas":3}"#, "m2"))
        .unwrap();

    match next_event(&mut events).await {
        WatchEvent::Updated { data_id, md5, .. } => {
            assert_eq!(data_id, "app.json");
            assert_eq!(md5, "m2");
        }
        other => panic!("expected Updated, got {:?}", other),
    }

    let updated = timeout(Duration::from_secs(5), handle.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.replicas, 3);
    assert_eq!(callback_calls.load(Ordering::SeqCst), 1);

    shutdown_tx.send(()).unwrap();
    tokio_test::assert_ok!(task.await.unwrap());
}

#[tokio::test]
async fn decode_failure_keeps_previous_value() {
    let (source, tx) = ControlledConfigSource::new(r#"{"name":"orders","replicas":1}"#);

    let (watcher, handle, mut events) =
        ConfigWatcher::<AppConfig>::new(Box::new(source), 16).await.unwrap();

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let task = tokio::spawn(async move { watcher.run_with_shutdown(Some(shutdown_rx)).await });

    assert!(matches!(next_event(&mut events).await, WatchEvent::Started { .. }));

    tx.send(change("app.json", "{broken", "bad")).unwrap();
    assert!(matches!(
        next_event(&mut events).await,
        WatchEvent::DecodeFailed { .. }
    ));
    assert_eq!(handle.current().replicas, 1);

    shutdown_tx.send(()).unwrap();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn identical_content_is_not_reapplied() {
    let initial = r#"{"name":"orders"}"#;
    let (source, tx) = ControlledConfigSource::new(initial);
    let callback_calls = Arc::new(AtomicUsize::new(0));
    let calls = Arc::clone(&callback_calls);

    let (watcher, _handle, mut events) =
        ConfigWatcher::<AppConfig>::new(Box::new(source), 16).await.unwrap();
    let watcher = watcher.on_change(move |_| {
        calls.fetch_add(1, Ordering::SeqCst);
    });

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let task = tokio::spawn(async move { watcher.run_with_shutdown(Some(shutdown_rx)).await });

    assert!(matches!(next_event(&mut events).await, WatchEvent::Started { .. }));

    tx.send(change("app.json", initial, "m1")).unwrap();
    assert!(matches!(
        next_event(&mut events).await,
        WatchEvent::Unchanged { .. }
    ));
    assert_eq!(callback_calls.load(Ordering::SeqCst), 0);

    shutdown_tx.send(()).unwrap();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn shutdown_signal_terminates_watcher() {
    let source = IdleConfigSource::new(r#"{"name":"orders"}"#);

    let (watcher, _handle, mut events) =
        ConfigWatcher::<AppConfig>::new(Box::new(source), 16).await.unwrap();

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let task = tokio::spawn(async move { watcher.run_with_shutdown(Some(shutdown_rx)).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown_tx.send(()).unwrap();

    let result = timeout(Duration::from_secs(5), task).await;
    assert!(result.is_ok(), "Watcher should terminate within 5 seconds");
    assert!(result.unwrap().unwrap().is_ok());

    assert!(matches!(next_event(&mut events).await, WatchEvent::Started { .. }));
    match next_event(&mut events).await {
        WatchEvent::Stopped { reason } => assert_eq!(reason, "Shutdown signal"),
        other => panic!("expected Stopped, got {:?}", other),
    }
}

#[tokio::test]
async fn closed_source_stream_stops_watcher() {
    let (source, tx) = ControlledConfigSource::new(r#"{"name":"orders"}"#);

    let (watcher, _handle, _events) =
        ConfigWatcher::<AppConfig>::new(Box::new(source), 16).await.unwrap();

    let (_shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let task = tokio::spawn(async move { watcher.run_with_shutdown(Some(shutdown_rx)).await });

    drop(tx);

    let result = timeout(Duration::from_secs(5), task).await;
    assert!(result.is_ok(), "Watcher should stop once the source stream ends");
}

#[tokio::test]
async fn full_event_channel_does_not_block_updates_or_shutdown() {
    let (source, tx) = ControlledConfigSource::new(r#"{"name":"orders","replicas":1}"#);

    // Capacity 1 and never drained: Started fills it, later events are dropped
    let (watcher, mut handle, mut events) =
        ConfigWatcher::<AppConfig>::new(Box::new(source), 1).await.unwrap();

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let task = tokio::spawn(async move { watcher.run_with_shutdown(Some(shutdown_rx)).await });

    for replicas in 2..=5 {
        let content = format!(r#"{{"name":"orders","replicas":{}}}"#, replicas);
        tx.send(change("app.json", &content, &format!("m{}", replicas)))
            .unwrap();
    }

    timeout(Duration::from_secs(5), async {
        while handle.current().replicas != 5 {
            handle.changed().await.unwrap();
        }
    })
    .await
    .expect("all changes applied despite a full event channel");

    shutdown_tx.send(()).unwrap();
    let result = timeout(Duration::from_secs(5), task).await;
    assert!(result.is_ok(), "Watcher should terminate within 5 seconds");
    tokio_test::assert_ok!(result.unwrap().unwrap());

    // Only the event that fit is delivered
    assert!(matches!(next_event(&mut events).await, WatchEvent::Started { .. }));
    assert!(events.try_recv().is_err());
}
