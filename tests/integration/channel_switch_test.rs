//! Integration tests for active channel switching.

mod helpers;

use huddle_core::error::ErrorKind;
use huddle_core::types::ChannelStatus;
use huddle_realtime::SwitchOutcome;
use huddle_realtime::bridge::MemoryHub;

use helpers::{TestClient, message_event, settle};

#[tokio::test(start_paused = true)]
async fn test_rapid_switches_leave_only_last_channel() {
    let hub = MemoryHub::new();
    let alice = TestClient::joined(&hub, "alice", "lobby").await;

    let (a, b, c) = tokio::join!(
        alice.session.switch_to("room-a"),
        alice.session.switch_to("room-b"),
        alice.session.switch_to("room-c"),
    );
    assert_eq!(a.unwrap(), SwitchOutcome::Superseded);
    assert_eq!(b.unwrap(), SwitchOutcome::Superseded);
    assert_eq!(c.unwrap(), SwitchOutcome::Ready);
    settle().await;

    assert_eq!(alice.backend.attached_channels(), vec!["room-c"]);
    for released in ["lobby", "room-a", "room-b"] {
        assert_eq!(hub.receiver_count(released), 0, "orphan subscription on {released}");
    }
    assert!(hub.presence_members("lobby").is_empty());

    let current = alice.session.current_channel().unwrap();
    assert_eq!(current.name, "room-c");
    assert_eq!(current.status, ChannelStatus::Attached);
    assert!(current.ready);
}

#[tokio::test(start_paused = true)]
async fn test_immediate_second_switch_never_subscribes_first() {
    let hub = MemoryHub::new();
    let alice = TestClient::new(&hub);
    alice.session.connect("alice").await.unwrap();

    let (a, b) = tokio::join!(
        alice.session.switch_to("room-a"),
        alice.session.switch_to("room-b"),
    );
    assert_eq!(a.unwrap(), SwitchOutcome::Superseded);
    assert_eq!(b.unwrap(), SwitchOutcome::Ready);

    hub.inject("room-a", message_event("m1", "s1"));
    settle().await;

    assert_eq!(alice.backend.attached_channels(), vec!["room-b"]);
    assert_eq!(hub.subscribe_calls("room-a"), 0);
    assert_eq!(alice.events.message_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_sequential_switch_releases_previous() {
    let hub = MemoryHub::new();
    let alice = TestClient::joined(&hub, "alice", "room-a").await;
    let bob = TestClient::joined(&hub, "bob", "room-a").await;
    settle().await;
    assert_eq!(bob.session.presence_members(), vec!["alice", "bob"]);

    let outcome = alice.session.switch_to("room-b").await.unwrap();
    assert_eq!(outcome, SwitchOutcome::Ready);
    settle().await;

    assert_eq!(alice.backend.attached_channels(), vec!["room-b"]);
    assert_eq!(alice.session.presence_members(), vec!["alice"]);
    assert_eq!(bob.session.presence_members(), vec!["bob"]);

    hub.inject("room-a", message_event("m1", "s1"));
    settle().await;
    assert!(alice.events.message_ids("room-a").is_empty());
}

#[tokio::test]
async fn test_same_channel_is_noop() {
    let hub = MemoryHub::new();
    let alice = TestClient::joined(&hub, "alice", "general").await;

    let outcome = alice.session.switch_to("general").await.unwrap();
    assert_eq!(outcome, SwitchOutcome::AlreadyActive);
    assert_eq!(alice.backend.attach_calls("general"), 1);
    assert_eq!(hub.subscribe_calls("general"), 4);
}

#[tokio::test]
async fn test_switch_before_connect_is_not_ready() {
    let hub = MemoryHub::new();
    let alice = TestClient::new(&hub);

    let err = alice.session.switch_to("general").await.unwrap_err();
    assert!(err.is(ErrorKind::NotReady));
    assert!(alice.session.current_channel().is_none());
}

#[tokio::test]
async fn test_attach_failure_is_not_retried() {
    let hub = MemoryHub::new();
    let alice = TestClient::new(&hub);
    alice.session.connect("alice").await.unwrap();
    alice.backend.faults().fail_attach("broken");

    let err = alice.session.switch_to("broken").await.unwrap_err();
    assert!(err.is(ErrorKind::ChannelSwitch));
    assert_eq!(alice.backend.attach_calls("broken"), 1);
    assert!(!alice.session.current_channel().unwrap().ready);

    let err = alice.session.send("hello", None).await.unwrap_err();
    assert!(err.is(ErrorKind::NotReady));
}
