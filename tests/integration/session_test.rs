//! Integration tests for messaging on an active channel.

mod helpers;

use huddle_core::error::ErrorKind;
use huddle_core::types::MessageMetadata;
use huddle_realtime::bridge::MemoryHub;

use helpers::{TestClient, message_event, raw_message, settle};

#[tokio::test]
async fn test_duplicate_identity_delivered_at_most_once() {
    let hub = MemoryHub::new();
    let alice = TestClient::joined(&hub, "alice", "general").await;

    hub.inject("general", message_event("m1", "s1"));
    hub.inject("general", message_event("m1", "s2"));
    hub.inject("general", message_event("m1", "s1"));
    settle().await;

    assert_eq!(alice.events.message_ids("general"), vec!["m1"]);
}

#[tokio::test(start_paused = true)]
async fn test_switching_clears_dedup_state() {
    let hub = MemoryHub::new();
    let alice = TestClient::joined(&hub, "alice", "room-a").await;

    hub.inject("room-a", message_event("m1", "s1"));
    settle().await;

    alice.session.switch_to("room-b").await.unwrap();
    hub.inject("room-b", message_event("m1", "s1"));
    hub.inject("room-a", message_event("m2", "s2"));
    settle().await;

    assert_eq!(alice.events.message_ids("room-a"), vec!["m1"]);
    assert_eq!(alice.events.message_ids("room-b"), vec!["m1"]);
}

#[tokio::test]
async fn test_messages_flow_between_clients() {
    let hub = MemoryHub::new();
    let alice = TestClient::joined(&hub, "alice", "general").await;
    let bob = TestClient::joined(&hub, "bob", "general").await;

    let metadata = MessageMetadata::new().with_topic("standup");
    assert!(alice.session.send("morning", Some(metadata)).await.unwrap());
    settle().await;

    let received = bob.events.messages.lock().unwrap().clone();
    assert_eq!(received.len(), 1);
    let (channel, message) = &received[0];
    assert_eq!(channel, "general");
    assert_eq!(message.content, "morning");
    assert_eq!(message.sender_id, "alice");
    assert_eq!(message.topic.as_deref(), Some("standup"));
    assert!(message.id.is_some());
    assert!(message.transport_serial.is_some());

    // publishers receive their own messages too
    assert_eq!(alice.events.message_count(), 1);
}

#[tokio::test]
async fn test_oversized_payload_rejected_before_publish() {
    let hub = MemoryHub::new();
    let alice = TestClient::joined(&hub, "alice", "general").await;

    let err = alice
        .session
        .send(&"x".repeat(70_000), None)
        .await
        .unwrap_err();

    assert!(err.is(ErrorKind::PayloadTooLarge));
    assert_eq!(alice.backend.publish_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_once_then_succeeds() {
    let hub = MemoryHub::new();
    let alice = TestClient::joined(&hub, "alice", "general").await;
    alice.backend.faults().rate_limit_publishes(1);

    assert!(alice.session.send("hello", None).await.unwrap());
    assert_eq!(alice.backend.publish_calls(), 2);
    assert_eq!(hub.history("general").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_twice_gives_up() {
    let hub = MemoryHub::new();
    let alice = TestClient::joined(&hub, "alice", "general").await;
    alice.backend.faults().rate_limit_publishes(2);

    assert!(!alice.session.send("hello", None).await.unwrap());
    assert_eq!(alice.backend.publish_calls(), 2);
    assert!(hub.history("general").is_empty());
}

#[tokio::test]
async fn test_send_before_channel_ready_fails_fast() {
    let hub = MemoryHub::new();
    let alice = TestClient::new(&hub);
    alice.session.connect("alice").await.unwrap();

    let err = alice.session.send("hello", None).await.unwrap_err();
    assert!(err.is(ErrorKind::NotReady));
    assert_eq!(alice.backend.publish_calls(), 0);
}

#[tokio::test]
async fn test_history_newest_first() {
    let hub = MemoryHub::new();
    hub.seed_history(
        "general",
        vec![
            raw_message("m1", "0001", "first", 1_000),
            raw_message("m2", "0002", "second", 2_000),
            raw_message("m3", "0003", "third", 3_000),
        ],
    );
    let alice = TestClient::joined(&hub, "alice", "general").await;

    let history = alice.session.fetch_history(10).await.unwrap();
    let ids: Vec<_> = history.iter().filter_map(|m| m.id.clone()).collect();
    assert_eq!(ids, vec!["m3", "m2", "m1"]);
}

#[tokio::test]
async fn test_history_empty_cases() {
    let hub = MemoryHub::new();
    let alice = TestClient::new(&hub);
    alice.session.connect("alice").await.unwrap();

    // no active channel
    assert!(alice.session.fetch_history(10).await.unwrap().is_empty());

    alice.session.switch_to("quiet").await.unwrap();
    assert!(alice.session.fetch_history(10).await.unwrap().is_empty());
    assert!(alice.session.fetch_history(0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_presence_enter_and_leave() {
    let hub = MemoryHub::new();
    let alice = TestClient::joined(&hub, "alice", "general").await;
    assert_eq!(alice.session.presence_members(), vec!["alice"]);

    let bob = TestClient::joined(&hub, "bob", "general").await;
    settle().await;
    assert_eq!(alice.session.presence_members(), vec!["alice", "bob"]);
    assert_eq!(bob.session.presence_members(), vec!["alice", "bob"]);
    assert_eq!(
        alice.events.last_members(),
        Some(vec!["alice".to_string(), "bob".to_string()])
    );

    bob.session.close().await;
    settle().await;
    assert_eq!(alice.session.presence_members(), vec!["alice"]);
    assert_eq!(alice.events.last_members(), Some(vec!["alice".to_string()]));
}

#[tokio::test]
async fn test_typing_signal() {
    let hub = MemoryHub::new();
    let alice = TestClient::joined(&hub, "alice", "general").await;
    let bob = TestClient::joined(&hub, "bob", "general").await;

    bob.session.send_typing(true).await.unwrap();
    settle().await;
    assert!(alice.session.typing_members().contains("bob"));

    bob.session.send_typing(false).await.unwrap();
    settle().await;
    assert!(alice.session.typing_members().is_empty());
    assert_eq!(alice.events.typing.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_reactions() {
    let hub = MemoryHub::new();
    let alice = TestClient::joined(&hub, "alice", "general").await;
    let bob = TestClient::joined(&hub, "bob", "general").await;

    assert!(bob.session.send_room_reaction("applause").await);
    assert!(bob.session.send_message_reaction("m1", "like").await);
    settle().await;

    let room = alice.events.room_reactions.lock().unwrap().clone();
    assert_eq!(room.len(), 1);
    assert_eq!(room[0].name, "applause");
    assert_eq!(room[0].user_id, "bob");

    let summaries = alice.events.message_reactions.lock().unwrap().clone();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].message_identity, "m1");
    assert_eq!(summaries[0].summary["like"].total, 1);

    assert!(bob.session.delete_message_reaction("m1", "like").await);
    settle().await;
    let summaries = alice.events.message_reactions.lock().unwrap().clone();
    assert!(summaries[1].summary.is_empty());
}

#[tokio::test]
async fn test_reaction_without_channel_makes_no_call() {
    let hub = MemoryHub::new();
    let alice = TestClient::new(&hub);
    alice.session.connect("alice").await.unwrap();

    assert!(!alice.session.send_room_reaction("like").await);
    assert_eq!(alice.backend.reaction_calls(), 0);
}
