//! Integration tests for connection establishment and recovery.

mod helpers;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use huddle_core::config::RealtimeConfig;
use huddle_core::error::ErrorKind;
use huddle_core::types::ConnectionState;
use huddle_realtime::bridge::MemoryHub;

use helpers::{RefusingTokens, TestClient};

#[tokio::test]
async fn test_connect_reaches_connected() {
    let hub = MemoryHub::new();
    let alice = TestClient::new(&hub);
    assert_eq!(alice.session.connection_state(), ConnectionState::Initialized);

    alice.session.connect("alice").await.unwrap();
    assert_eq!(alice.session.connection_state(), ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_connect_times_out() {
    let hub = MemoryHub::new();
    let config = RealtimeConfig {
        connect_timeout_seconds: 3,
        ..RealtimeConfig::default()
    };
    let alice = TestClient::with_config(&hub, config);
    alice.backend.faults().hold_connect(true);

    let started = tokio::time::Instant::now();
    let err = alice.session.connect("alice").await.unwrap_err();
    assert!(err.is(ErrorKind::Connection));
    assert!(started.elapsed() >= Duration::from_secs(3));
}

#[tokio::test]
async fn test_refused_token_fails_connect() {
    let hub = MemoryHub::new();
    let alice = TestClient::with_tokens(&hub, RealtimeConfig::default(), Arc::new(RefusingTokens));

    let err = alice.session.connect("alice").await.unwrap_err();
    assert!(err.is(ErrorKind::Authentication));
    assert_eq!(alice.backend.connect_calls(), 0);
    assert_eq!(alice.session.connection_state(), ConnectionState::Initialized);
}

#[tokio::test]
async fn test_caller_retry_after_rejected_connect() {
    let hub = MemoryHub::new();
    let alice = TestClient::new(&hub);
    alice.backend.faults().reject_connect(true);

    let err = alice.session.connect("alice").await.unwrap_err();
    assert!(err.is(ErrorKind::Connection));

    alice.backend.faults().reject_connect(false);
    alice.session.connect("alice").await.unwrap();
    assert_eq!(alice.session.connection_state(), ConnectionState::Connected);
    alice.session.switch_to("general").await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_transient_disconnect_recovers() {
    let hub = MemoryHub::new();
    let alice = TestClient::joined(&hub, "alice", "general").await;
    alice.backend.faults().fail_connects(1);

    alice.backend.simulate_state(ConnectionState::Disconnected);
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert_eq!(alice.session.connection_state(), ConnectionState::Connected);
    assert_eq!(alice.backend.connect_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_reconnects_suspend() {
    let hub = MemoryHub::new();
    let alice = TestClient::new(&hub);
    let changes = Arc::new(Mutex::new(Vec::new()));
    let sink = changes.clone();
    alice
        .session
        .on_connection_state_change(move |change| sink.lock().unwrap().push(change.clone()));

    alice.session.connect("alice").await.unwrap();
    alice.backend.faults().fail_connects(u32::MAX);
    alice.backend.simulate_state(ConnectionState::Disconnected);
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(alice.session.connection_state(), ConnectionState::Suspended);
    let changes = changes.lock().unwrap();
    let last = changes.last().unwrap();
    assert_eq!(last.previous, ConnectionState::Disconnected);
    assert_eq!(last.current, ConnectionState::Suspended);
    assert!(last.reason.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_failed_state_is_terminal() {
    let hub = MemoryHub::new();
    let alice = TestClient::new(&hub);
    alice.session.connect("alice").await.unwrap();

    alice.backend.simulate_state(ConnectionState::Failed);
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(alice.session.connection_state(), ConnectionState::Failed);
    assert_eq!(alice.backend.connect_calls(), 1);
}

#[tokio::test]
async fn test_close_disconnects_and_leaves_presence() {
    let hub = MemoryHub::new();
    let alice = TestClient::joined(&hub, "alice", "general").await;
    assert_eq!(hub.presence_members("general").len(), 1);

    alice.session.close().await;
    assert_eq!(alice.session.connection_state(), ConnectionState::Disconnected);
    assert!(hub.presence_members("general").is_empty());
    assert!(alice.session.current_channel().is_none());
}
