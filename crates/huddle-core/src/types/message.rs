//! Chat message types: the normalized inbound [`Message`] and the outbound
//! wire payload.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::id::MessageId;

/// A chat message as delivered to handlers and returned by history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Logical message id stamped by the sender, if any.
    pub id: Option<String>,
    /// Client id of the sender.
    pub sender_id: String,
    /// Display name of the sender.
    pub sender_display_name: String,
    /// Avatar URL of the sender.
    pub sender_avatar: Option<String>,
    /// Text content.
    pub content: String,
    /// Client timestamp in milliseconds since the epoch.
    pub timestamp_millis: i64,
    /// Optional topic the message belongs to.
    pub topic: Option<String>,
    /// Serial assigned by the transport on delivery.
    pub transport_serial: Option<String>,
    /// Forward-compatible metadata not covered by the typed fields.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Message {
    /// Identity used for deduplication: the logical id, else the transport serial.
    pub fn identity(&self) -> Option<&str> {
        self.id
            .as_deref()
            .filter(|id| !id.is_empty())
            .or_else(|| self.transport_serial.as_deref().filter(|s| !s.is_empty()))
    }
}

/// Optional caller metadata for an outbound message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageMetadata {
    /// Topic to tag the message with.
    pub topic: Option<String>,
    /// Extra key/value pairs, bounded by `max_metadata_entries`.
    #[serde(default)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl MessageMetadata {
    /// Empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the topic.
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Adds one extra entry.
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// The serialized body of an outbound message.
///
/// Its JSON encoding is what the size threshold is measured against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundPayload {
    /// Logical message id.
    pub id: MessageId,
    /// Text content.
    pub content: String,
    /// Client id of the sender.
    pub sender_id: String,
    /// Display name of the sender.
    pub sender_display_name: String,
    /// Avatar URL of the sender.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_avatar: Option<String>,
    /// Client timestamp in milliseconds since the epoch.
    pub timestamp_millis: i64,
    /// Optional topic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// Extra metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: Option<&str>, serial: Option<&str>) -> Message {
        Message {
            id: id.map(str::to_string),
            sender_id: "alice".into(),
            sender_display_name: "Alice".into(),
            sender_avatar: None,
            content: "hi".into(),
            timestamp_millis: 0,
            topic: None,
            transport_serial: serial.map(str::to_string),
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn test_identity_prefers_logical_id() {
        assert_eq!(message(Some("m1"), Some("s1")).identity(), Some("m1"));
    }

    #[test]
    fn test_identity_falls_back_to_serial() {
        assert_eq!(message(None, Some("s1")).identity(), Some("s1"));
        assert_eq!(message(Some(""), Some("s1")).identity(), Some("s1"));
        assert_eq!(message(None, None).identity(), None);
    }

    #[test]
    fn test_payload_uses_camel_case() {
        let payload = OutboundPayload {
            id: MessageId::new(),
            content: "hello".into(),
            sender_id: "alice".into(),
            sender_display_name: "Alice".into(),
            sender_avatar: None,
            timestamp_millis: 42,
            topic: Some("rust".into()),
            extra: BTreeMap::new(),
        };
        let json = serde_json::to_value(&payload).expect("serialize");
        assert_eq!(json["senderId"], "alice");
        assert_eq!(json["timestampMillis"], 42);
        assert!(json.get("senderAvatar").is_none());
        assert!(json.get("extra").is_none());
    }
}
