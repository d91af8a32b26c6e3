//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use huddle_core::config::RealtimeConfig;
use huddle_core::error::AppError;
use huddle_core::events::{ChannelEvent, RawMessage};
use huddle_core::result::AppResult;
use huddle_core::traits::{AuthToken, StaticTokenProvider, TokenProvider};
use huddle_core::types::{Message, MessageReaction, PresenceChange, RoomReaction};
use huddle_realtime::bridge::{MemoryBackend, MemoryHub};
use huddle_realtime::{ChatSession, SessionEvents};

/// Everything a session delivered to its handlers.
#[derive(Default)]
pub struct Recorder {
    pub messages: Mutex<Vec<(String, Message)>>,
    pub presence: Mutex<Vec<PresenceChange>>,
    pub typing: Mutex<Vec<HashSet<String>>>,
    pub room_reactions: Mutex<Vec<RoomReaction>>,
    pub message_reactions: Mutex<Vec<MessageReaction>>,
}

impl Recorder {
    /// Message ids delivered on `channel`, in order.
    pub fn message_ids(&self, channel: &str) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| c == channel)
            .filter_map(|(_, m)| m.id.clone())
            .collect()
    }

    pub fn message_count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }

    /// Member list carried by the most recent presence change.
    pub fn last_members(&self) -> Option<Vec<String>> {
        self.presence
            .lock()
            .unwrap()
            .last()
            .map(|change| change.members.clone())
    }
}

impl SessionEvents for Recorder {
    fn on_message(&self, channel: &str, message: &Message) {
        self.messages
            .lock()
            .unwrap()
            .push((channel.to_string(), message.clone()));
    }

    fn on_presence_change(&self, _channel: &str, change: &PresenceChange) {
        self.presence.lock().unwrap().push(change.clone());
    }

    fn on_typing_change(&self, _channel: &str, typing: &HashSet<String>) {
        self.typing.lock().unwrap().push(typing.clone());
    }

    fn on_room_reaction(&self, _channel: &str, reaction: &RoomReaction) {
        self.room_reactions.lock().unwrap().push(reaction.clone());
    }

    fn on_message_reaction(&self, _channel: &str, reaction: &MessageReaction) {
        self.message_reactions.lock().unwrap().push(reaction.clone());
    }
}

/// Token provider that always refuses.
#[derive(Debug)]
pub struct RefusingTokens;

#[async_trait]
impl TokenProvider for RefusingTokens {
    async fn fetch_token(&self, client_id: &str) -> AppResult<AuthToken> {
        Err(AppError::authentication(format!("No token for '{client_id}'")))
    }
}

/// A session on a shared hub with direct access to its backend.
pub struct TestClient {
    pub session: ChatSession,
    pub backend: Arc<MemoryBackend>,
    pub events: Arc<Recorder>,
}

impl TestClient {
    /// Create a disconnected client on `hub`.
    pub fn new(hub: &MemoryHub) -> Self {
        Self::with_config(hub, RealtimeConfig::default())
    }

    pub fn with_config(hub: &MemoryHub, config: RealtimeConfig) -> Self {
        Self::with_tokens(hub, config, Arc::new(StaticTokenProvider::new("test-token")))
    }

    pub fn with_tokens(hub: &MemoryHub, config: RealtimeConfig, tokens: Arc<dyn TokenProvider>) -> Self {
        let backend = Arc::new(MemoryBackend::new(hub.clone()));
        let session = ChatSession::new(backend.clone(), tokens, config);
        let events = Arc::new(Recorder::default());
        session.set_handlers(events.clone());
        Self {
            session,
            backend,
            events,
        }
    }

    /// Create a client, connect it as `user` and make `channel` active.
    pub async fn joined(hub: &MemoryHub, user: &str, channel: &str) -> Self {
        let client = Self::new(hub);
        client.session.connect(user).await.expect("connect");
        client.session.switch_to(channel).await.expect("switch");
        client
    }
}

/// A raw message as another client would publish it.
pub fn raw_message(id: &str, serial: &str, content: &str, timestamp_millis: i64) -> RawMessage {
    RawMessage {
        serial: Some(serial.to_string()),
        client_id: "bob".to_string(),
        timestamp_millis,
        data: serde_json::json!({
            "id": id,
            "content": content,
            "senderId": "bob",
            "senderDisplayName": "Bob",
            "timestampMillis": timestamp_millis,
        }),
    }
}

pub fn message_event(id: &str, serial: &str) -> ChannelEvent {
    ChannelEvent::Message(raw_message(id, serial, "hello", 1_700_000_000_000))
}

/// Let listener tasks drain their queues.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}
