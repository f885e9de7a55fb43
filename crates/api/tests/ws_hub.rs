//! Unit tests for `ObserverHub`.
//!
//! These exercise the hub directly, without performing any HTTP upgrades.
//! Fake observers are just the receiver halves returned by `register`.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use medval_api::ws::{HeartbeatConfig, ObserverHub};
use medval_core::events::JobEvent;

fn hub() -> Arc<ObserverHub> {
    Arc::new(ObserverHub::default())
}

fn fast_heartbeat(interval_ms: u64, timeout_ms: u64) -> Arc<ObserverHub> {
    Arc::new(ObserverHub::new(HeartbeatConfig {
        interval: Duration::from_millis(interval_ms),
        timeout: Duration::from_millis(timeout_ms),
    }))
}

fn text_of(message: Message) -> String {
    match message {
        Message::Text(text) => text.as_str().to_string(),
        other => panic!("Expected text frame, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Test: new hub starts with zero observers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn new_hub_has_zero_observers() {
    let hub = hub();

    assert_eq!(hub.connection_count().await, 0);
}

// ---------------------------------------------------------------------------
// Test: register() and unregister() adjust the count
// ---------------------------------------------------------------------------

#[tokio::test]
async fn register_and_unregister() {
    let hub = hub();

    let _rx = hub.register("conn-1".to_string()).await;
    assert_eq!(hub.connection_count().await, 1);

    assert!(hub.unregister("conn-1").await);
    assert_eq!(hub.connection_count().await, 0);
}

// ---------------------------------------------------------------------------
// Test: unregister() is idempotent
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unregister_is_idempotent() {
    let hub = hub();

    let _rx = hub.register("conn-1".to_string()).await;
    assert!(hub.unregister("conn-1").await);
    assert!(!hub.unregister("conn-1").await);
    assert!(!hub.unregister("nonexistent").await);

    assert_eq!(hub.connection_count().await, 0);
}

// ---------------------------------------------------------------------------
// Test: broadcast() delivers the serialized event to every observer
// ---------------------------------------------------------------------------

#[tokio::test]
async fn broadcast_reaches_all_observers() {
    let hub = hub();

    let mut rx1 = hub.register("conn-1".to_string()).await;
    let mut rx2 = hub.register("conn-2".to_string()).await;

    let delivered = hub.broadcast(&JobEvent::Progress { progress: 50.0 }).await;
    assert_eq!(delivered, 2);

    for rx in [&mut rx1, &mut rx2] {
        let json: serde_json::Value =
            serde_json::from_str(&text_of(rx.try_recv().unwrap())).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["progress"], 50.0);
    }
}

// ---------------------------------------------------------------------------
// Test: broadcast with no observers is a no-op
// ---------------------------------------------------------------------------

#[tokio::test]
async fn broadcast_with_no_observers() {
    let hub = hub();

    let delivered = hub
        .broadcast(&JobEvent::Error {
            message: "nobody listening".into(),
        })
        .await;

    assert_eq!(delivered, 0);
}

// ---------------------------------------------------------------------------
// Test: an unreachable observer is removed; the others still receive
// ---------------------------------------------------------------------------

#[tokio::test]
async fn broadcast_drops_unreachable_observers() {
    let hub = hub();

    let rx1 = hub.register("conn-1".to_string()).await;
    let mut rx2 = hub.register("conn-2".to_string()).await;
    drop(rx1);

    let delivered = hub.broadcast(&JobEvent::Progress { progress: 10.0 }).await;

    assert_eq!(delivered, 1);
    assert_eq!(hub.connection_count().await, 1);
    assert!(matches!(rx2.try_recv(), Ok(Message::Text(_))));

    // Unregistering the dropped observer afterwards is harmless.
    assert!(!hub.unregister("conn-1").await);
}

// ---------------------------------------------------------------------------
// Test: events arrive in broadcast order
// ---------------------------------------------------------------------------

#[tokio::test]
async fn broadcast_preserves_order() {
    let hub = hub();
    let mut rx = hub.register("conn-1".to_string()).await;

    for progress in [0.0, 33.0, 66.0, 100.0] {
        hub.broadcast(&JobEvent::Progress { progress }).await;
    }

    let mut seen = Vec::new();
    while let Ok(message) = rx.try_recv() {
        let event: JobEvent = serde_json::from_str(&text_of(message)).unwrap();
        seen.push(event);
    }
    assert_eq!(
        seen,
        vec![
            JobEvent::Progress { progress: 0.0 },
            JobEvent::Progress { progress: 33.0 },
            JobEvent::Progress { progress: 66.0 },
            JobEvent::Progress { progress: 100.0 },
        ]
    );
}

// ---------------------------------------------------------------------------
// Test: shutdown_all() sends Close and clears all observers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn shutdown_all_sends_close_and_clears() {
    let hub = hub();

    let mut rx1 = hub.register("conn-1".to_string()).await;
    let mut rx2 = hub.register("conn-2".to_string()).await;

    hub.shutdown_all().await;

    assert_eq!(hub.connection_count().await, 0);
    assert!(matches!(rx1.try_recv(), Ok(Message::Close(None))));
    assert!(matches!(rx2.try_recv(), Ok(Message::Close(None))));
}

// ---------------------------------------------------------------------------
// Test: the heartbeat pings live observers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn heartbeat_pings_observer() {
    let hub = fast_heartbeat(20, 10_000);
    let mut rx = hub.register("conn-1".to_string()).await;

    let message = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("ping within timeout")
        .expect("channel open");

    assert!(matches!(message, Message::Ping(_)));
    assert_eq!(hub.connection_count().await, 1);
}

// ---------------------------------------------------------------------------
// Test: a silent observer is closed and removed after the timeout
// ---------------------------------------------------------------------------

#[tokio::test]
async fn silent_observer_is_removed() {
    let hub = fast_heartbeat(20, 60);
    let mut rx = hub.register("conn-1".to_string()).await;

    let mut closed = false;
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        match tokio::time::timeout(Duration::from_millis(100), rx.recv()).await {
            Ok(Some(Message::Close(_))) => {
                closed = true;
                break;
            }
            Ok(Some(_)) => continue,
            Ok(None) => break,
            Err(_) => continue,
        }
    }

    assert!(closed, "observer should receive Close on heartbeat timeout");
    assert_eq!(hub.connection_count().await, 0);
}

// ---------------------------------------------------------------------------
// Test: touch() keeps an observer alive past the timeout
// ---------------------------------------------------------------------------

#[tokio::test]
async fn touched_observer_stays_registered() {
    let hub = fast_heartbeat(20, 100);
    let _rx = hub.register("conn-1".to_string()).await;

    for _ in 0..10 {
        tokio::time::sleep(Duration::from_millis(30)).await;
        hub.touch("conn-1").await;
    }

    assert_eq!(hub.connection_count().await, 1);
}

// ---------------------------------------------------------------------------
// Test: a zero heartbeat interval is rejected up front
// ---------------------------------------------------------------------------

#[test]
#[should_panic(expected = "heartbeat interval must be non-zero")]
fn zero_heartbeat_interval_panics_on_construction() {
    let _ = ObserverHub::new(HeartbeatConfig {
        interval: Duration::ZERO,
        timeout: Duration::from_secs(1),
    });
}
