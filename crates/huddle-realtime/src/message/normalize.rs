//! Conversion of raw backend events into the session's entity shapes.

use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;

use huddle_core::events::{
    RawMessage, RawMessageReaction, RawPresenceEvent, RawRoomReaction, RawTypingEvent,
};
use huddle_core::types::{Message, MessageReaction, PresenceMember, RoomReaction};

/// Lenient view of a published body. Every field is optional so that
/// messages from older or foreign clients still normalize.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct InboundBody {
    id: Option<String>,
    content: Option<String>,
    #[serde(alias = "text")]
    body: Option<String>,
    sender_id: Option<String>,
    sender_display_name: Option<String>,
    sender_avatar: Option<String>,
    #[serde(alias = "timestamp")]
    timestamp_millis: Option<i64>,
    topic: Option<String>,
    extra: BTreeMap<String, serde_json::Value>,
}

/// Normalize a raw message.
///
/// Sender fields fall back to the transport client id, the timestamp to the
/// backend timestamp, and a bare JSON string body is treated as the content.
pub fn normalize_message(raw: &RawMessage) -> Message {
    let body = match &raw.data {
        serde_json::Value::String(text) => InboundBody {
            content: Some(text.clone()),
            ..InboundBody::default()
        },
        other => serde_json::from_value::<InboundBody>(other.clone()).unwrap_or_default(),
    };

    let sender_id = body
        .sender_id
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| raw.client_id.clone());
    let sender_display_name = body
        .sender_display_name
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| sender_id.clone());

    Message {
        id: body.id.filter(|id| !id.is_empty()),
        sender_display_name,
        sender_id,
        sender_avatar: body.sender_avatar,
        content: body.content.or(body.body).unwrap_or_default(),
        timestamp_millis: body.timestamp_millis.unwrap_or(raw.timestamp_millis),
        topic: body.topic,
        transport_serial: raw.serial.clone(),
        extra: body.extra,
    }
}

/// Normalize a presence event into a member record.
pub fn normalize_presence(raw: &RawPresenceEvent) -> PresenceMember {
    PresenceMember {
        client_id: raw.client_id.clone(),
        last_event: raw.action,
        data: raw.data.clone(),
    }
}

/// Normalize a typing snapshot into a set of client ids.
pub fn normalize_typing(raw: &RawTypingEvent) -> HashSet<String> {
    raw.currently_typing.iter().cloned().collect()
}

/// Normalize a room reaction.
pub fn normalize_room_reaction(raw: &RawRoomReaction) -> RoomReaction {
    RoomReaction {
        name: raw.name.clone(),
        user_id: raw.client_id.clone(),
        created_at_millis: raw.timestamp_millis,
    }
}

/// Normalize a message reaction summary.
pub fn normalize_message_reaction(raw: &RawMessageReaction) -> MessageReaction {
    MessageReaction {
        message_identity: raw.message_identity.clone(),
        reaction_name: raw.reaction_name.clone(),
        summary: raw.summary.clone(),
    }
}
