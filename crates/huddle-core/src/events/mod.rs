//! Raw events delivered by the realtime backend on an attached channel.
//!
//! These are the backend's shapes before normalization. The subscription
//! multiplexer converts them into the types in [`crate::types`] before any
//! handler sees them.

pub mod message;
pub mod presence;
pub mod reaction;
pub mod typing;

use serde::{Deserialize, Serialize};

pub use message::RawMessage;
pub use presence::RawPresenceEvent;
pub use reaction::{RawMessageReaction, RawRoomReaction};
pub use typing::RawTypingEvent;

/// The independent event streams a channel exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    /// Chat messages.
    Messages,
    /// Presence enter/leave/update.
    Presence,
    /// Typing indicator snapshots.
    Typing,
    /// Room and message reactions.
    Reactions,
}

impl StreamKind {
    /// All stream kinds, in subscription order.
    pub const ALL: [StreamKind; 4] = [
        StreamKind::Messages,
        StreamKind::Presence,
        StreamKind::Typing,
        StreamKind::Reactions,
    ];

    /// Returns the stream name as a string slice.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Messages => "messages",
            Self::Presence => "presence",
            Self::Typing => "typing",
            Self::Reactions => "reactions",
        }
    }
}

/// Union of all raw channel events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stream", content = "event", rename_all = "snake_case")]
pub enum ChannelEvent {
    /// A published chat message.
    Message(RawMessage),
    /// A presence transition.
    Presence(RawPresenceEvent),
    /// A typing snapshot.
    Typing(RawTypingEvent),
    /// A room-level reaction.
    RoomReaction(RawRoomReaction),
    /// An updated message reaction summary.
    MessageReaction(RawMessageReaction),
}

impl ChannelEvent {
    /// The stream this event is delivered on.
    pub fn stream(&self) -> StreamKind {
        match self {
            Self::Message(_) => StreamKind::Messages,
            Self::Presence(_) => StreamKind::Presence,
            Self::Typing(_) => StreamKind::Typing,
            Self::RoomReaction(_) | Self::MessageReaction(_) => StreamKind::Reactions,
        }
    }
}
