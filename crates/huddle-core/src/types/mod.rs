//! Core type definitions used across the Huddle workspace.

pub mod channel;
pub mod connection;
pub mod id;
pub mod message;
pub mod presence;
pub mod reaction;

pub use channel::{ChannelSession, ChannelStatus};
pub use connection::{ConnectionState, ConnectionStateChange};
pub use id::*;
pub use message::{Message, MessageMetadata, OutboundPayload};
pub use presence::{PresenceAction, PresenceChange, PresenceMember};
pub use reaction::{MessageReaction, ReactionCount, RoomReaction};
