//! In-memory pub/sub hub shared by every [`MemoryBackend`](super::MemoryBackend)
//! in one process.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::broadcast;

use huddle_core::events::{
    ChannelEvent, RawMessage, RawMessageReaction, RawPresenceEvent, RawRoomReaction,
    RawTypingEvent, StreamKind,
};
use huddle_core::types::{PresenceAction, PresenceMember, ReactionCount};

/// Default broadcast buffer per stream.
const DEFAULT_BUFFER_SIZE: usize = 256;

/// State of one channel on the hub.
#[derive(Debug)]
struct HubChannel {
    /// Stream → broadcast sender
    streams: HashMap<StreamKind, broadcast::Sender<ChannelEvent>>,
    /// Published messages, oldest first
    history: Vec<RawMessage>,
    /// Client id → presence data
    presence: BTreeMap<String, Option<serde_json::Value>>,
    /// Clients typing
    typing: BTreeSet<String>,
    /// Message identity → reaction name → clients
    reactions: BTreeMap<String, BTreeMap<String, BTreeSet<String>>>,
}

impl HubChannel {
    fn new(buffer_size: usize) -> Self {
        let streams = StreamKind::ALL
            .iter()
            .map(|kind| (*kind, broadcast::channel(buffer_size).0))
            .collect();
        Self {
            streams,
            history: Vec::new(),
            presence: BTreeMap::new(),
            typing: BTreeSet::new(),
            reactions: BTreeMap::new(),
        }
    }

    fn broadcast(&self, event: ChannelEvent) {
        if let Some(tx) = self.streams.get(&event.stream()) {
            let _ = tx.send(event);
        }
    }

    fn reaction_summary(&self, identity: &str) -> BTreeMap<String, ReactionCount> {
        self.reactions
            .get(identity)
            .map(|by_name| {
                by_name
                    .iter()
                    .filter(|(_, clients)| !clients.is_empty())
                    .map(|(name, clients)| {
                        (
                            name.clone(),
                            ReactionCount {
                                total: clients.len() as u32,
                                client_ids: clients.iter().cloned().collect(),
                            },
                        )
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug)]
struct HubState {
    channels: DashMap<String, HubChannel>,
    /// (channel, stream) → successful subscribe calls
    subscribe_calls: DashMap<(String, StreamKind), u64>,
    serial: AtomicU64,
    buffer_size: usize,
}

/// In-process realtime hub.
///
/// Cloning is cheap; all clones share the same channels.
#[derive(Debug, Clone)]
pub struct MemoryHub {
    inner: Arc<HubState>,
}

impl MemoryHub {
    /// Create a hub with the default stream buffer size
    pub fn new() -> Self {
        Self::with_buffer_size(DEFAULT_BUFFER_SIZE)
    }

    /// Create a hub with a custom stream buffer size
    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self {
            inner: Arc::new(HubState {
                channels: DashMap::new(),
                subscribe_calls: DashMap::new(),
                serial: AtomicU64::new(0),
                buffer_size,
            }),
        }
    }

    fn with_channel<R>(&self, channel: &str, f: impl FnOnce(&mut HubChannel) -> R) -> R {
        let mut entry = self
            .inner
            .channels
            .entry(channel.to_string())
            .or_insert_with(|| HubChannel::new(self.inner.buffer_size));
        f(entry.value_mut())
    }

    fn next_serial(&self) -> String {
        let n = self.inner.serial.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{n:016}")
    }

    /// Listen to one stream of a channel
    pub(crate) fn subscribe(&self, channel: &str, stream: StreamKind) -> broadcast::Receiver<ChannelEvent> {
        let rx = self.with_channel(channel, |ch| {
            ch.streams
                .get(&stream)
                .map(broadcast::Sender::subscribe)
                .unwrap_or_else(|| broadcast::channel(1).1)
        });
        *self
            .inner
            .subscribe_calls
            .entry((channel.to_string(), stream))
            .or_insert(0) += 1;
        rx
    }

    /// Store and broadcast a published message, assigning a serial
    pub(crate) fn publish(&self, channel: &str, client_id: &str, data: serde_json::Value) -> RawMessage {
        let raw = RawMessage {
            serial: Some(self.next_serial()),
            client_id: client_id.to_string(),
            timestamp_millis: Utc::now().timestamp_millis(),
            data,
        };
        self.with_channel(channel, |ch| {
            ch.history.push(raw.clone());
            ch.broadcast(ChannelEvent::Message(raw.clone()));
        });
        raw
    }

    pub(crate) fn presence_enter(&self, channel: &str, client_id: &str, data: Option<serde_json::Value>) {
        self.with_channel(channel, |ch| {
            let action = if ch.presence.contains_key(client_id) {
                PresenceAction::Update
            } else {
                PresenceAction::Enter
            };
            ch.presence.insert(client_id.to_string(), data.clone());
            ch.broadcast(ChannelEvent::Presence(RawPresenceEvent {
                action,
                client_id: client_id.to_string(),
                data,
                timestamp_millis: Utc::now().timestamp_millis(),
            }));
        });
    }

    /// Returns `true` if the client was present
    pub(crate) fn presence_leave(&self, channel: &str, client_id: &str) -> bool {
        self.with_channel(channel, |ch| {
            let Some(data) = ch.presence.remove(client_id) else {
                return false;
            };
            ch.broadcast(ChannelEvent::Presence(RawPresenceEvent {
                action: PresenceAction::Leave,
                client_id: client_id.to_string(),
                data,
                timestamp_millis: Utc::now().timestamp_millis(),
            }));
            true
        })
    }

    /// Current members, reported as `present`
    pub fn presence_members(&self, channel: &str) -> Vec<PresenceMember> {
        self.with_channel(channel, |ch| {
            ch.presence
                .iter()
                .map(|(client_id, data)| PresenceMember {
                    client_id: client_id.clone(),
                    last_event: PresenceAction::Present,
                    data: data.clone(),
                })
                .collect()
        })
    }

    pub(crate) fn set_typing(&self, channel: &str, client_id: &str, is_typing: bool) {
        self.with_channel(channel, |ch| {
            let changed = if is_typing {
                ch.typing.insert(client_id.to_string())
            } else {
                ch.typing.remove(client_id)
            };
            if changed {
                ch.broadcast(ChannelEvent::Typing(RawTypingEvent {
                    currently_typing: ch.typing.iter().cloned().collect(),
                }));
            }
        });
    }

    pub(crate) fn room_reaction(&self, channel: &str, client_id: &str, name: &str) {
        self.with_channel(channel, |ch| {
            ch.broadcast(ChannelEvent::RoomReaction(RawRoomReaction {
                name: name.to_string(),
                client_id: client_id.to_string(),
                timestamp_millis: Utc::now().timestamp_millis(),
            }));
        });
    }

    /// Add or remove one client's reaction and broadcast the new summary
    pub(crate) fn message_reaction(
        &self,
        channel: &str,
        client_id: &str,
        identity: &str,
        name: &str,
        add: bool,
    ) {
        self.with_channel(channel, |ch| {
            let clients = ch
                .reactions
                .entry(identity.to_string())
                .or_default()
                .entry(name.to_string())
                .or_default();
            let changed = if add {
                clients.insert(client_id.to_string())
            } else {
                clients.remove(client_id)
            };
            if changed {
                let summary = ch.reaction_summary(identity);
                ch.broadcast(ChannelEvent::MessageReaction(RawMessageReaction {
                    message_identity: identity.to_string(),
                    reaction_name: Some(name.to_string()),
                    summary,
                }));
            }
        });
    }

    /// Stored messages, oldest first
    pub fn history(&self, channel: &str) -> Vec<RawMessage> {
        self.with_channel(channel, |ch| ch.history.clone())
    }

    /// Append messages to a channel's history without broadcasting
    pub fn seed_history(&self, channel: &str, messages: Vec<RawMessage>) {
        self.with_channel(channel, |ch| ch.history.extend(messages));
    }

    /// Deliver a raw event to the channel's listeners as if the backend sent it
    pub fn inject(&self, channel: &str, event: ChannelEvent) {
        self.with_channel(channel, |ch| ch.broadcast(event));
    }

    /// Successful subscribe calls for any stream of `channel`
    pub fn subscribe_calls(&self, channel: &str) -> u64 {
        self.inner
            .subscribe_calls
            .iter()
            .filter(|r| r.key().0 == channel)
            .map(|r| *r.value())
            .sum()
    }

    /// Live receivers on `channel` summed across its streams
    pub fn receiver_count(&self, channel: &str) -> usize {
        self.inner
            .channels
            .get(channel)
            .map(|ch| ch.streams.values().map(broadcast::Sender::receiver_count).sum())
            .unwrap_or(0)
    }
}

impl Default for MemoryHub {
    fn default() -> Self {
        Self::new()
    }
}
