//! Builds outbound payloads stamped with the sender's identity.

use chrono::Utc;

use huddle_core::types::{MessageId, MessageMetadata, OutboundPayload};

/// Identity stamped into every outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderProfile {
    /// Client id used for the backend connection.
    pub user_id: String,
    /// Name shown next to messages.
    pub display_name: String,
    /// Avatar URL.
    pub avatar: Option<String>,
}

impl SenderProfile {
    /// Profile whose display name defaults to the user id.
    pub fn new(user_id: impl Into<String>) -> Self {
        let user_id = user_id.into();
        Self {
            display_name: user_id.clone(),
            user_id,
            avatar: None,
        }
    }

    /// Sets the display name.
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    /// Sets the avatar URL.
    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }
}

/// Build an outbound payload with a fresh message id and client timestamp.
pub fn build_payload(
    profile: &SenderProfile,
    content: &str,
    metadata: MessageMetadata,
) -> OutboundPayload {
    OutboundPayload {
        id: MessageId::new(),
        content: content.to_string(),
        sender_id: profile.user_id.clone(),
        sender_display_name: profile.display_name.clone(),
        sender_avatar: profile.avatar.clone(),
        timestamp_millis: Utc::now().timestamp_millis(),
        topic: metadata.topic,
        extra: metadata.extra,
    }
}
